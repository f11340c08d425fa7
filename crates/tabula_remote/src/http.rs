//! HTTP implementation of [`RemoteApi`] for a PocketBase-style REST API.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so the backend can
//! run on any blocking client (see the `reqwest` feature) or on a scripted
//! one in tests.
//!
//! Endpoints used, relative to the configured base URL:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list      | `GET /api/collections/{c}/records?page=..&perPage=..&filter=..` |
//! | create    | `POST /api/collections/{c}/records` |
//! | update    | `PATCH /api/collections/{c}/records/{id}` |
//! | delete    | `DELETE /api/collections/{c}/records/{id}` |

use crate::api::{Fields, RemoteApi};
use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use serde::Deserialize;
use serde_json::Value as Json;
use tracing::debug;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// The method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implementations only move bytes; status handling happens in
/// [`HttpRemote`]. An `Err` means no response was received.
pub trait HttpClient: Send + Sync {
    /// Sends `request` and returns the response.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request could not be completed.
    fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    items: Vec<Fields>,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

/// Builds a filter expression such as `(model='Tesla' && year=2020)`.
///
/// Returns an empty string for an empty filter. String values are single
/// quoted with `\` and `'` escaped; arrays and objects are sent as quoted
/// JSON text.
#[must_use]
pub fn filter_expression(filter: &Fields) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let terms: Vec<String> = filter
        .iter()
        .map(|(field, value)| format!("{field}={}", literal(value)))
        .collect();
    format!("({})", terms.join(" && "))
}

fn literal(value: &Json) -> String {
    match value {
        Json::Null => "null".to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        Json::String(s) => quote(s),
        Json::Array(_) | Json::Object(_) => quote(&value.to_string()),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// [`RemoteApi`] over HTTP.
pub struct HttpRemote<C: HttpClient> {
    config: RemoteConfig,
    client: C,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a remote API talking to `config.base_url` through `client`.
    pub fn new(config: RemoteConfig, client: C) -> Self {
        Self { config, client }
    }

    /// The configuration in use.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn records_url(&self, collection: &str) -> String {
        format!(
            "{}/api/collections/{}/records",
            self.config.base_url,
            urlencoding::encode(collection)
        )
    }

    fn record_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.records_url(collection), urlencoding::encode(id))
    }

    fn request(&self, method: Method, url: String, body: Option<&Fields>) -> RemoteResult<HttpRequest> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = &self.config.auth_token {
            headers.push(("Authorization".to_string(), token.clone()));
        }
        let body = match body {
            Some(fields) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(serde_json::to_vec(fields)?)
            }
            None => None,
        };
        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    fn execute(
        &self,
        method: Method,
        url: String,
        body: Option<&Fields>,
        missing: Option<(&str, &str)>,
    ) -> RemoteResult<HttpResponse> {
        let request = self.request(method, url, body)?;
        debug!(method = method.as_str(), url = %request.url, "remote request");
        let response = self.client.send(&request)?;
        if response.is_success() {
            return Ok(response);
        }
        if let (404, Some((collection, id))) = (response.status, missing) {
            return Err(RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Err(RemoteError::Status {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        })
    }
}

impl<C: HttpClient> RemoteApi for HttpRemote<C> {
    fn list(&self, collection: &str, filter: &Fields) -> RemoteResult<Vec<Fields>> {
        let expression = filter_expression(filter);
        let mut records = Vec::new();
        let mut page = 1u32;
        loop {
            let mut url = format!(
                "{}?page={page}&perPage={}",
                self.records_url(collection),
                self.config.page_size
            );
            if !expression.is_empty() {
                url.push_str("&filter=");
                url.push_str(&urlencoding::encode(&expression));
            }
            let response = self.execute(Method::Get, url, None, None)?;
            let listed: ListPage = serde_json::from_slice(&response.body)?;
            let received = listed.items.len();
            records.extend(listed.items);
            if received == 0 || page >= listed.total_pages {
                break;
            }
            page += 1;
        }
        debug!(collection, records = records.len(), pages = page, "listed records");
        Ok(records)
    }

    fn create(&self, collection: &str, data: &Fields) -> RemoteResult<String> {
        let response = self.execute(Method::Post, self.records_url(collection), Some(data), None)?;
        let created: Created = serde_json::from_slice(&response.body)
            .map_err(|e| RemoteError::protocol(format!("create response without id: {e}")))?;
        Ok(created.id)
    }

    fn update(&self, collection: &str, id: &str, data: &Fields) -> RemoteResult<()> {
        self.execute(
            Method::Patch,
            self.record_url(collection, id),
            Some(data),
            Some((collection, id)),
        )?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        self.execute(
            Method::Delete,
            self.record_url(collection, id),
            None,
            Some((collection, id)),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn fields(value: Json) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn expression_joins_terms_with_and() {
        let filter = fields(json!({"model": "Tesla", "year": 2020, "used": false}));
        assert_eq!(
            filter_expression(&filter),
            "(model='Tesla' && used=false && year=2020)"
        );
        assert_eq!(filter_expression(&Fields::new()), "");
    }

    #[test]
    fn expression_escapes_quotes() {
        let filter = fields(json!({"name": "O'Brien \\ co"}));
        assert_eq!(filter_expression(&filter), r"(name='O\'Brien \\ co')");
    }

    proptest! {
        #[test]
        fn quoted_strings_never_end_early(s in ".*") {
            let quoted = quote(&s);
            let inner = &quoted[1..quoted.len() - 1];
            // Every quote inside is escaped by an odd run of backslashes.
            let bytes = inner.as_bytes();
            for (i, b) in bytes.iter().enumerate() {
                if *b == b'\'' {
                    let run = bytes[..i].iter().rev().take_while(|c| **c == b'\\').count();
                    prop_assert!(run % 2 == 1);
                }
            }
        }
    }
}
