use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::snapshot::HeaderMap;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// One outgoing HTTP call made while serving a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestLogContext {
    pub method: String,
    pub full_url: String,
    pub route_template: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status_code: Option<u16>,
    pub request_headers: HeaderMap,
    pub request_body: Option<String>,
    pub response_headers: HeaderMap,
    pub response_body: Option<String>,
    pub exception_type: Option<String>,
    pub exception_message: Option<String>,
    pub stack_trace: Option<String>,
    pub inner_exception_message: Option<String>,
}

impl HttpRequestLogContext {
    pub fn total_milliseconds(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds().max(0)
    }

    pub fn failed(&self) -> bool {
        self.exception_type.is_some()
    }
}

/// Text captured for a body, or a placeholder naming the limit when the
/// body is larger than `max_mb` megabytes.
pub fn capture_body(bytes: &[u8], max_mb: u64) -> String {
    if bytes.len() as u64 > max_mb.saturating_mul(BYTES_PER_MB) {
        return body_placeholder(max_mb);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn body_placeholder(max_mb: u64) -> String {
    format!("[body omitted: larger than {} MB]", max_mb)
}
