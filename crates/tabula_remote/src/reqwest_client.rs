//! Blocking [`HttpClient`] backed by reqwest.

use crate::error::{RemoteError, RemoteResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method};
use std::time::Duration;

/// [`HttpClient`] over a blocking [`reqwest::blocking::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> RemoteResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::transport(format!("building http client: {e}"), false))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse> {
        let mut builder = self
            .client
            .request(method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| RemoteError::transport(e.to_string(), e.is_timeout() || e.is_connect()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| RemoteError::transport(format!("reading response body: {e}"), true))?
            .to_vec();
        Ok(HttpResponse { status, body })
    }
}
