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

//! Automation rules, scoped to a location.

use crate::error::ConsoleResult;
use crate::platform::PlatformClient;
use crate::resource::{Container, CopyNaming, Remote, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Empty for documents that were never created (import files).
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
    /// Server fields this console does not model; shown but never sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRequest {
    pub name: String,
    pub actions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rules;

impl ResourceKind for Rules {
    type Resource = Rule;
    type Request = RuleRequest;

    const SINGULAR: &'static str = "rule";
    const TITLE: &'static str = "Rules";
    const CONTAINER: &'static str = "location";

    fn key(rule: &Rule) -> String {
        rule.id.clone()
    }

    fn label(rule: &Rule) -> String {
        rule.name.clone()
    }

    fn request(rule: &Rule) -> RuleRequest {
        RuleRequest {
            name: rule.name.clone(),
            actions: rule.actions.clone(),
            time_zone_id: rule.time_zone_id.clone(),
        }
    }

    fn request_name(request: &RuleRequest) -> &str {
        &request.name
    }

    fn rename(request: &mut RuleRequest, name: String) {
        request.name = name;
    }

    fn default_copy_naming() -> CopyNaming {
        CopyNaming::Suffix("-copy".into())
    }

    // Rule documents do not reliably say which location they belong to.
    fn requires_container_resolution() -> bool {
        true
    }

    fn carried_container(_rule: &Rule) -> Option<String> {
        None
    }

    fn container_hint(rule: &Rule) -> Option<String> {
        match (rule.owner_type.as_deref(), rule.owner_id.as_ref()) {
            (Some(kind), Some(id)) if kind.eq_ignore_ascii_case("location") => Some(id.clone()),
            _ => None,
        }
    }
}

impl Remote<Rules> for PlatformClient {
    fn list(&mut self, location: Option<&str>) -> ConsoleResult<Vec<Rule>> {
        if let Some(location) = location {
            return self.rules(location);
        }

        let mut seen = HashSet::new();
        let mut all = Vec::new();
        for location in self.locations()? {
            for rule in self.rules(&location.location_id)? {
                if seen.insert(rule.id.clone()) {
                    all.push(rule);
                }
            }
        }
        Ok(all)
    }

    fn create(&mut self, location: &str, request: &RuleRequest) -> ConsoleResult<Rule> {
        self.create_rule(location, request)
    }

    fn update(&mut self, id: &str, location: &str, request: &RuleRequest) -> ConsoleResult<Rule> {
        self.update_rule(id, location, request)
    }

    fn delete(&mut self, id: &str, location: &str) -> ConsoleResult<()> {
        self.delete_rule(id, location)
    }

    fn containers(&mut self) -> ConsoleResult<Vec<Container>> {
        Ok(self
            .locations()?
            .into_iter()
            .map(|location| Container {
                id: location.location_id,
                name: location.name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::editor;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn sample() -> Rule {
        serde_json::from_value(json!({
            "id": "r-1",
            "name": "Night Mode",
            "actions": [{"if": {"equals": {"left": {"string": "a"}, "right": {"string": "a"}}}}],
            "timeZoneId": "Europe/Berlin",
            "ownerType": "Location",
            "ownerId": "loc-2",
            "dateCreated": "2024-01-01T00:00:00Z",
            "executionLocation": "Cloud"
        }))
        .unwrap()
    }

    #[test]
    fn request_carries_only_mutable_fields() {
        let body = serde_json::to_value(Rules::request(&sample())).unwrap();
        let keys: BTreeSet<_> = body.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            BTreeSet::from(["actions".to_string(), "name".into(), "timeZoneId".into()])
        );
    }

    #[test]
    fn editor_text_round_trips_server_fields() {
        let rule = sample();
        let text = editor::render(&rule).unwrap();
        let parsed: Rule = editor::parse(&text, Rules::SINGULAR).unwrap();
        assert_eq!(parsed, rule);
        assert_eq!(parsed.extra["executionLocation"], "Cloud");
    }

    #[test]
    fn hints_owner_location() {
        assert_eq!(Rules::container_hint(&sample()).as_deref(), Some("loc-2"));
        let mut unowned = sample();
        unowned.owner_type = Some("User".into());
        assert_eq!(Rules::container_hint(&unowned), None);
    }

    #[test]
    fn unscoped_list_spans_all_locations() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/locations");
            then.status(200).json_body(json!({"items": [
                {"locationId": "loc-1", "name": "Home"},
                {"locationId": "loc-2", "name": "Cabin"}
            ]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v1/rules").query_param("locationId", "loc-1");
            then.status(200)
                .json_body(json!({"items": [{"id": "r-1", "name": "Night Mode"}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v1/rules").query_param("locationId", "loc-2");
            then.status(200)
                .json_body(json!({"items": [{"id": "r-2", "name": "Kitchen Light Rule"}]}));
        });

        let mut client = PlatformClient::new(
            ApiClient::new(&server.base_url(), "t", Duration::from_secs(5)).unwrap(),
        );
        let rules = Remote::<Rules>::list(&mut client, None).unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r-1", "r-2"]);

        let containers = Remote::<Rules>::containers(&mut client).unwrap();
        assert_eq!(containers[1].id, "loc-2");
        assert_eq!(containers[1].name, "Cabin");
    }
}
