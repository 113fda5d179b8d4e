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

use crate::client::{ApiClient, ResponseData};
use crate::error::{ConsoleError, ConsoleResult};
use crate::rules::{Rule, RuleRequest};
use crate::schedules::{Schedule, ScheduleRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub location_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledApp {
    pub installed_app_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
}

/// Typed endpoints of the platform REST API.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    api: ApiClient,
}

impl PlatformClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn locations(&self) -> ConsoleResult<Vec<Location>> {
        decode_items(self.api.get_items(&["v1", "locations"], &[])?, "location")
    }

    pub fn rules(&self, location_id: &str) -> ConsoleResult<Vec<Rule>> {
        let items = self
            .api
            .get_items(&["v1", "rules"], &location_query(location_id))?;
        decode_items(items, "rule")
    }

    pub fn create_rule(&self, location_id: &str, request: &RuleRequest) -> ConsoleResult<Rule> {
        debug!(location_id, name = %request.name, "creating rule");
        let response =
            self.api
                .post_json(&["v1", "rules"], &location_query(location_id), request)?;
        decode_body(response, "rule")
    }

    pub fn update_rule(
        &self,
        rule_id: &str,
        location_id: &str,
        request: &RuleRequest,
    ) -> ConsoleResult<Rule> {
        debug!(rule_id, location_id, "updating rule");
        let response = self.api.put_json(
            &["v1", "rules", rule_id],
            &location_query(location_id),
            request,
        )?;
        decode_body(response, "rule")
    }

    pub fn delete_rule(&self, rule_id: &str, location_id: &str) -> ConsoleResult<()> {
        debug!(rule_id, location_id, "deleting rule");
        self.api
            .delete(&["v1", "rules", rule_id], &location_query(location_id))?;
        Ok(())
    }

    pub fn installed_apps(&self) -> ConsoleResult<Vec<InstalledApp>> {
        decode_items(
            self.api.get_items(&["v1", "installedapps"], &[])?,
            "installed app",
        )
    }

    pub fn schedules(&self, installed_app_id: &str) -> ConsoleResult<Vec<Schedule>> {
        let items = self.api.get_items(
            &["v1", "installedapps", installed_app_id, "schedules"],
            &[],
        )?;
        decode_items(items, "schedule")
    }

    pub fn create_schedule(
        &self,
        installed_app_id: &str,
        request: &ScheduleRequest,
    ) -> ConsoleResult<Schedule> {
        debug!(installed_app_id, name = %request.name, "creating schedule");
        let response = self.api.post_json(
            &["v1", "installedapps", installed_app_id, "schedules"],
            &[],
            request,
        )?;
        decode_body(response, "schedule")
    }

    pub fn delete_schedule(&self, installed_app_id: &str, name: &str) -> ConsoleResult<()> {
        debug!(installed_app_id, name, "deleting schedule");
        self.api.delete(
            &["v1", "installedapps", installed_app_id, "schedules", name],
            &[],
        )?;
        Ok(())
    }
}

fn location_query(location_id: &str) -> [(&'static str, String); 1] {
    [("locationId", location_id.to_string())]
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> ConsoleResult<T> {
    serde_json::from_value(value)
        .map_err(|err| ConsoleError::other(format!("decoding {what} from platform: {err}")))
}

fn decode_items<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> ConsoleResult<Vec<T>> {
    items.into_iter().map(|item| decode(item, what)).collect()
}

fn decode_body<T: DeserializeOwned>(response: ResponseData, what: &str) -> ConsoleResult<T> {
    let json = response.json.ok_or_else(|| {
        debug!(body = %response.body, "response without JSON document");
        ConsoleError::other(format!(
            "platform answered {} without a {what} document",
            response.status
        ))
    })?;
    decode(json, what)
}
