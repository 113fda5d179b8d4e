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

use crate::error::{ConsoleError, ConsoleResult};
use anyhow::{Context, anyhow};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT_VALUE: &str = concat!("stterm/", env!("CARGO_PKG_VERSION"));

/// Upper bound on `_links.next` hops for one collection.
const MAX_PAGES: usize = 100;

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub body: String,
    pub json: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
    token: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url).context("parsing base URL")?;
        if parsed.cannot_be_a_base() {
            return Err(anyhow!("base URL `{base_url}` cannot carry a path"));
        }
        let http = Client::builder()
            .user_agent(HeaderValue::from_static(USER_AGENT_VALUE))
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: parsed,
            http,
            token: token.to_string(),
            timeout,
        })
    }

    pub fn get(&self, segments: &[&str], query: &[(&str, String)]) -> ConsoleResult<ResponseData> {
        self.request(Method::GET, segments, query, Option::<&Value>::None)
    }

    /// Fetches a paged collection and returns the concatenated `items`.
    pub fn get_items(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> ConsoleResult<Vec<Value>> {
        let mut url = self.endpoint(segments, query)?;
        let mut response = self.get(segments, query)?;
        let mut items = Vec::new();

        for _ in 0..MAX_PAGES {
            let json = response
                .json
                .ok_or_else(|| ConsoleError::other(format!("response from {url} is not JSON")))?;

            match json.get("items") {
                Some(Value::Array(page)) => items.extend(page.iter().cloned()),
                Some(Value::Null) | None => {}
                Some(_) => {
                    return Err(ConsoleError::other(format!(
                        "`items` in response from {url} is not an array"
                    )));
                }
            }

            match next_page(&json) {
                Some(next) => {
                    url = Url::parse(next).with_context(|| format!("parsing next page link `{next}`"))?;
                    response = self.send(Method::GET, url.clone(), Option::<&Value>::None)?;
                }
                None => return Ok(items),
            }
        }

        warn!(%url, "collection did not end after {MAX_PAGES} pages");
        Err(ConsoleError::other(format!(
            "stopped paging {url} after {MAX_PAGES} pages"
        )))
    }

    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        body: &T,
    ) -> ConsoleResult<ResponseData> {
        self.request(Method::POST, segments, query, Some(body))
    }

    pub fn put_json<T: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        body: &T,
    ) -> ConsoleResult<ResponseData> {
        self.request(Method::PUT, segments, query, Some(body))
    }

    pub fn delete(&self, segments: &[&str], query: &[(&str, String)]) -> ConsoleResult<ResponseData> {
        self.request(Method::DELETE, segments, query, Option::<&Value>::None)
    }

    fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&T>,
    ) -> ConsoleResult<ResponseData> {
        let url = self.endpoint(segments, query)?;
        self.send(method, url, body)
    }

    /// Builds an endpoint URL; every segment is percent-encoded on its own.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> ConsoleResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConsoleError::other(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }

    fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&T>,
    ) -> ConsoleResult<ResponseData> {
        debug!(%method, %url, "sending request");
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(&self.token)
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .map_err(|err| self.transport_error(err, &url, "sending request to"))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|err| self.transport_error(err, &url, "reading response body from"))?;

        if !status.is_success() {
            warn!(%method, %url, code = status.as_u16(), "platform rejected request");
            return Err(classify(status, &text));
        }

        let json = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };

        Ok(ResponseData {
            status: status.as_u16(),
            body: text,
            json,
        })
    }

    fn transport_error(&self, err: reqwest::Error, url: &Url, doing: &str) -> ConsoleError {
        if err.is_timeout() {
            warn!(%url, "request timed out");
            return ConsoleError::api(
                StatusCode::REQUEST_TIMEOUT.as_u16(),
                format!(
                    "request to {url} timed out after {}s",
                    self.timeout.as_secs_f32()
                ),
            );
        }
        ConsoleError::Other(anyhow::Error::new(err).context(format!("{doing} {url}")))
    }
}

fn classify(status: StatusCode, body: &str) -> ConsoleError {
    ConsoleError::api(status.as_u16(), error_message(status, body))
}

/// Renders the platform error envelope
/// `{"requestId": .., "error": {"code", "message", "details": [..]}}`.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Some(error) = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json.get("error").cloned())
    {
        let code = error.get("code").and_then(Value::as_str);
        let message = error.get("message").and_then(Value::as_str).unwrap_or("");
        let mut msg = match code {
            Some(code) if !message.is_empty() => format!("{code}: {message}"),
            Some(code) => code.to_string(),
            None => message.to_string(),
        };
        if let Some(details) = error.get("details").and_then(Value::as_array) {
            for detail in details {
                if let Some(text) = detail.get("message").and_then(Value::as_str) {
                    msg.push_str("\n  • ");
                    msg.push_str(text);
                }
            }
        }
        if !msg.is_empty() {
            return msg;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    if trimmed.chars().count() > 200 {
        format!("{}...", trimmed.chars().take(200).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

fn next_page(json: &Value) -> Option<&str> {
    json.get("_links")?
        .get("next")?
        .get("href")?
        .as_str()
        .filter(|href| !href.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.base_url(), "test-token", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn sends_bearer_token_and_parses_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/locations")
                .header("Authorization", "Bearer test-token");
            then.status(200).json_body(json!({"items": []}));
        });

        let response = client(&server).get(&["v1", "locations"], &[]).unwrap();

        mock.assert();
        assert_eq!(response.status, 200);
        assert!(response.json.unwrap()["items"].is_array());
    }

    #[test]
    fn posts_json_body_with_query() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/rules")
                .query_param("locationId", "loc-1")
                .json_body(json!({"name": "Night Mode"}));
            then.status(200).json_body(json!({"id": "r-1", "name": "Night Mode"}));
        });

        let response = client(&server)
            .post_json(
                &["v1", "rules"],
                &[("locationId", "loc-1".to_string())],
                &json!({"name": "Night Mode"}),
            )
            .unwrap();

        mock.assert();
        assert_eq!(response.json.unwrap()["id"], "r-1");
    }

    #[test]
    fn empty_delete_response_has_no_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/v1/rules/r-1");
            then.status(204);
        });

        let response = client(&server).delete(&["v1", "rules", "r-1"], &[]).unwrap();

        mock.assert();
        assert_eq!(response.status, 204);
        assert!(response.json.is_none());
    }

    #[test]
    fn classifies_platform_error_envelope() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/v1/rules/r-1");
            then.status(422).json_body(json!({
                "requestId": "abc",
                "error": {
                    "code": "ConstraintViolationError",
                    "message": "The request is malformed.",
                    "details": [{"code": "PatternError", "message": "name is too long"}]
                }
            }));
        });

        let err = client(&server)
            .put_json(&["v1", "rules", "r-1"], &[], &json!({"name": "x"}))
            .unwrap_err();

        assert!(matches!(err, ConsoleError::Api { .. }));
        assert_eq!(err.code(), Some(422));
        assert_eq!(
            err.to_string(),
            "Error 422\nConstraintViolationError: The request is malformed.\n  • name is too long"
        );
    }

    #[test]
    fn classifies_bare_error_bodies() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/rules");
            then.status(403);
        });

        let err = client(&server).get(&["v1", "rules"], &[]).unwrap_err();
        assert_eq!(err.to_string(), "Error 403\nForbidden");
    }

    #[test]
    fn follows_next_links_across_pages() {
        let server = MockServer::start();
        let second = server.url("/v1/locations/page2");
        let first_page = server.mock(|when, then| {
            when.method(GET).path("/v1/locations");
            then.status(200).json_body(json!({
                "items": [{"locationId": "loc-1"}],
                "_links": {"next": {"href": second}}
            }));
        });
        let second_page = server.mock(|when, then| {
            when.method(GET).path("/v1/locations/page2");
            then.status(200).json_body(json!({
                "items": [{"locationId": "loc-2"}],
                "_links": {"next": null}
            }));
        });

        let items = client(&server).get_items(&["v1", "locations"], &[]).unwrap();

        first_page.assert();
        second_page.assert();
        let ids: Vec<_> = items.iter().map(|i| i["locationId"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["loc-1", "loc-2"]);
    }

    #[test]
    fn expired_calls_are_classified() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/rules");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({"items": []}));
        });

        let client =
            ApiClient::new(&server.base_url(), "t", Duration::from_millis(200)).unwrap();
        let err = client.get(&["v1", "rules"], &[]).unwrap_err();

        assert_eq!(err.code(), Some(408));
    }

    #[test]
    fn stalled_body_is_classified_as_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n{\"items\"")
                .unwrap();
            stream.flush().unwrap();
            thread::sleep(Duration::from_secs(2));
        });

        let client =
            ApiClient::new(&format!("http://{addr}"), "t", Duration::from_millis(300)).unwrap();
        let err = client.get(&["v1", "rules"], &[]).unwrap_err();

        assert_eq!(err.code(), Some(408));
        server.join().unwrap();
    }

    #[test]
    fn encodes_each_path_segment() {
        let client =
            ApiClient::new("https://api.example.test/", "t", Duration::from_secs(1)).unwrap();
        let url = client
            .endpoint(
                &["v1", "installedapps", "app-1", "schedules", "morning run/2"],
                &[("locationId", "a b".to_string())],
            )
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.example.test/v1/installedapps/app-1/schedules/morning%20run%2F2?locationId=a+b"
        );
    }
}
