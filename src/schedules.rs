// stterm - terminal console for the SmartThings API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Installed-app schedules. A schedule is identified by its name within
//! the installed app that owns it.

use crate::error::{ConsoleError, ConsoleResult};
use crate::platform::PlatformClient;
use crate::resource::{Container, CopyNaming, Remote, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    pub expression: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "GMT".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<CronSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_execution_time: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron: Option<CronSchedule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Schedules;

impl ResourceKind for Schedules {
    type Resource = Schedule;
    type Request = ScheduleRequest;

    const SINGULAR: &'static str = "schedule";
    const TITLE: &'static str = "Schedules";
    const CONTAINER: &'static str = "installed app";

    fn key(schedule: &Schedule) -> String {
        schedule.name.clone()
    }

    fn label(schedule: &Schedule) -> String {
        schedule.name.clone()
    }

    fn request(schedule: &Schedule) -> ScheduleRequest {
        ScheduleRequest {
            name: schedule.name.clone(),
            cron: schedule.cron.clone(),
        }
    }

    fn request_name(request: &ScheduleRequest) -> &str {
        &request.name
    }

    fn rename(request: &mut ScheduleRequest, name: String) {
        request.name = name;
    }

    fn default_copy_naming() -> CopyNaming {
        CopyNaming::Token
    }

    fn requires_container_resolution() -> bool {
        false
    }

    fn carried_container(schedule: &Schedule) -> Option<String> {
        schedule
            .installed_app_id
            .clone()
            .filter(|id| !id.trim().is_empty())
    }
}

impl Remote<Schedules> for PlatformClient {
    fn list(&mut self, installed_app: Option<&str>) -> ConsoleResult<Vec<Schedule>> {
        let apps = match installed_app {
            Some(id) => vec![id.to_string()],
            None => self
                .installed_apps()?
                .into_iter()
                .map(|app| app.installed_app_id)
                .collect(),
        };

        let mut all = Vec::new();
        for app in apps {
            for mut schedule in self.schedules(&app)? {
                schedule.installed_app_id.get_or_insert_with(|| app.clone());
                all.push(schedule);
            }
        }
        Ok(all)
    }

    fn create(&mut self, installed_app: &str, request: &ScheduleRequest) -> ConsoleResult<Schedule> {
        self.create_schedule(installed_app, request)
    }

    /// The platform replaces a schedule when one with the same name is
    /// created again; a renamed schedule is created anew and the old one
    /// removed afterwards.
    fn update(
        &mut self,
        name: &str,
        installed_app: &str,
        request: &ScheduleRequest,
    ) -> ConsoleResult<Schedule> {
        let updated = self.create_schedule(installed_app, request)?;
        if request.name != name {
            debug!(from = name, to = %request.name, "schedule renamed, removing old entry");
            self.delete_schedule(installed_app, name).map_err(|err| {
                ConsoleError::partial(
                    format!(
                        "schedule {} was created but {name} could not be removed",
                        request.name
                    ),
                    err,
                )
            })?;
        }
        Ok(updated)
    }

    fn delete(&mut self, name: &str, installed_app: &str) -> ConsoleResult<()> {
        self.delete_schedule(installed_app, name)
    }

    fn containers(&mut self) -> ConsoleResult<Vec<Container>> {
        Ok(self
            .installed_apps()?
            .into_iter()
            .map(|app| Container {
                name: app
                    .display_name
                    .unwrap_or_else(|| app.installed_app_id.clone()),
                id: app.installed_app_id,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::controller::{Controller, ControllerOptions};
    use crate::editor;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn platform(server: &MockServer) -> PlatformClient {
        PlatformClient::new(ApiClient::new(&server.base_url(), "t", Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn editor_text_round_trips() {
        let schedule: Schedule = serde_json::from_value(json!({
            "name": "nightly",
            "cron": {"expression": "0 22 * * ? *", "timezone": "Europe/Oslo"},
            "installedAppId": "app-1",
            "locationId": "loc-1",
            "scheduledExecutionTime": 1700000000000i64
        }))
        .unwrap();

        let text = editor::render(&schedule).unwrap();
        let parsed: Schedule = editor::parse(&text, Schedules::SINGULAR).unwrap();
        assert_eq!(parsed, schedule);
        assert_eq!(Schedules::carried_container(&parsed).as_deref(), Some("app-1"));
    }

    #[test]
    fn request_omits_server_fields() {
        let schedule: Schedule = serde_json::from_value(json!({
            "name": "nightly",
            "cron": {"expression": "0 22 * * ? *"},
            "installedAppId": "app-1",
            "scheduledExecutionTime": 1
        }))
        .unwrap();

        let body = serde_json::to_value(Schedules::request(&schedule)).unwrap();
        assert_eq!(
            body,
            json!({"name": "nightly", "cron": {"expression": "0 22 * * ? *", "timezone": "GMT"}})
        );
    }

    #[test]
    fn unscoped_list_fills_in_owning_app() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/installedapps");
            then.status(200).json_body(json!({"items": [
                {"installedAppId": "app-1", "displayName": "Lights"},
                {"installedAppId": "app-2"}
            ]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v1/installedapps/app-1/schedules");
            then.status(200).json_body(json!({"items": [{"name": "dusk"}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v1/installedapps/app-2/schedules");
            then.status(200).json_body(json!({"items": []}));
        });

        let mut client = platform(&server);
        let schedules = Remote::<Schedules>::list(&mut client, None).unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].installed_app_id.as_deref(), Some("app-1"));

        let containers = Remote::<Schedules>::containers(&mut client).unwrap();
        assert_eq!(containers[0].name, "Lights");
        assert_eq!(containers[1].name, "app-2");
    }

    #[test]
    fn renaming_update_replaces_old_schedule() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/installedapps/app-1/schedules")
                .json_body(json!({"name": "late", "cron": {"expression": "0 23 * * ? *", "timezone": "GMT"}}));
            then.status(200).json_body(json!({"name": "late", "installedAppId": "app-1"}));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/v1/installedapps/app-1/schedules/nightly");
            then.status(200);
        });

        let request = ScheduleRequest {
            name: "late".into(),
            cron: Some(CronSchedule {
                expression: "0 23 * * ? *".into(),
                timezone: "GMT".into(),
            }),
        };
        let mut client = platform(&server);
        let updated = Remote::<Schedules>::update(&mut client, "nightly", "app-1", &request).unwrap();

        create.assert();
        delete.assert();
        assert_eq!(updated.name, "late");
    }

    #[test]
    fn half_done_rename_still_refreshes_the_list() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/installedapps");
            then.status(200).json_body(json!({"items": [{"installedAppId": "app-1"}]}));
        });
        let mut before = server.mock(|when, then| {
            when.method(GET).path("/v1/installedapps/app-1/schedules");
            then.status(200).json_body(json!({"items": [
                {"name": "nightly", "cron": {"expression": "0 22 * * ? *", "timezone": "GMT"}}
            ]}));
        });
        let create = server.mock(|when, then| {
            when.method(POST).path("/v1/installedapps/app-1/schedules");
            then.status(200).json_body(json!({"name": "late", "installedAppId": "app-1"}));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/v1/installedapps/app-1/schedules/nightly");
            then.status(500).body("boom");
        });

        let mut controller = Controller::<Schedules, _>::new(
            platform(&server),
            ControllerOptions::for_kind::<Schedules>(),
        );
        assert!(controller.setup());
        controller.select("nightly");
        let edited = controller.editor().text().replace("nightly", "late");

        before.delete();
        server.mock(|when, then| {
            when.method(GET).path("/v1/installedapps/app-1/schedules");
            then.status(200).json_body(json!({"items": [
                {"name": "late", "cron": {"expression": "0 22 * * ? *", "timezone": "GMT"}},
                {"name": "nightly", "cron": {"expression": "0 22 * * ? *", "timezone": "GMT"}}
            ]}));
        });

        assert!(!controller.save_text(&edited, false));

        create.assert();
        delete.assert();
        let keys: Vec<_> = controller.catalog().labels().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["late", "nightly"]);
        let status = controller.status().last_error().unwrap();
        assert_eq!(status.code, Some(500));
        assert!(status.text.contains("late was created but nightly could not be removed"));
    }
}
