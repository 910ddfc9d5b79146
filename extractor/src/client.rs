use std::error::Error as _;

use chrono::Utc;
use model::{HeaderMap, HttpRequestLogContext, capture_body};
use reqwest::{Client, Request};

use crate::context::RequestContext;

/// Response of a call made through [`MonitoredClient`], body already read.
#[derive(Debug, Clone)]
pub struct MonitoredResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl MonitoredResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP client that records every call on the current request context.
#[derive(Debug, Clone)]
pub struct MonitoredClient {
    inner: Client,
    max_body_mb: u64,
}

impl MonitoredClient {
    pub fn new(max_body_mb: u64) -> Self {
        Self::with_client(Client::new(), max_body_mb)
    }

    pub fn with_client(inner: Client, max_body_mb: u64) -> Self {
        Self { inner, max_body_mb }
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Executes `request` and appends its log to `ctx`, failed calls included.
    pub async fn send(
        &self,
        ctx: &RequestContext,
        request: Request,
    ) -> Result<MonitoredResponse, reqwest::Error> {
        let mut call = HttpRequestLogContext {
            method: request.method().to_string(),
            full_url: request.url().to_string(),
            route_template: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status_code: None,
            request_headers: header_map(request.headers()),
            request_body: request
                .body()
                .and_then(|b| b.as_bytes())
                .map(|b| capture_body(b, self.max_body_mb)),
            response_headers: HeaderMap::new(),
            response_body: None,
            exception_type: None,
            exception_message: None,
            stack_trace: None,
            inner_exception_message: None,
        };

        let result = self.execute(request).await;
        call.end_time = Utc::now();

        match result {
            Ok(response) => {
                call.status_code = Some(response.status);
                call.response_headers = response.headers.clone();
                call.response_body = Some(capture_body(&response.body, self.max_body_mb));
                ctx.record_http(call);
                Ok(response)
            }
            Err(e) => {
                log::warn!("Outgoing {} {} failed: {}", call.method, call.full_url, e);
                call.status_code = e.status().map(|s| s.as_u16());
                call.exception_type = Some("reqwest::Error".to_string());
                call.exception_message = Some(e.to_string());
                call.inner_exception_message = e.source().map(|s| s.to_string());
                ctx.record_http(call);
                Err(e)
            }
        }
    }

    async fn execute(&self, request: Request) -> Result<MonitoredResponse, reqwest::Error> {
        let response = self.inner.execute(request).await?;
        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let body = response.bytes().await?.to_vec();
        Ok(MonitoredResponse {
            status,
            headers,
            body,
        })
    }
}

fn header_map(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_insert_with(Vec::new)
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}
