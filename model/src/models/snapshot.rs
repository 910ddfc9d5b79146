use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exception::ExceptionChain;
use super::http_log::HttpRequestLogContext;
use super::log_entry::LogEntry;
use super::notification::Notification;

/// Header name to every value sent under it, ordered by name.
pub type HeaderMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestFacts {
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub path_template: Option<String>,
    pub query_string: String,
    pub headers: HeaderMap,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: Option<String>,
    pub client_id: Option<String>,
    pub user_agent: String,
    pub ip_address: String,
    pub remote_port: Option<u16>,
    pub local_port: Option<u16>,
}

/// Authenticated caller, empty for anonymous requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub roles: BTreeSet<String>,
    pub claims: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseFacts {
    pub status_code: u16,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub body_size: u64,
}

/// Everything observed about one finished request.
///
/// A snapshot is built once by the capture middleware and moved into the
/// ingestion queue; nothing writes to it after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub correlation_id: String,
    pub request_id: String,
    pub trace_id: String,
    pub request: RequestFacts,
    pub principal: Principal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub response: ResponseFacts,
    pub exception: Option<ExceptionChain>,
    pub log_entries: Vec<LogEntry>,
    pub http_client_logs: Vec<HttpRequestLogContext>,
    pub notifications: Vec<Notification>,
    pub db_query_count: u64,
}

impl Snapshot {
    /// Elapsed time between start and end, never negative.
    pub fn total_milliseconds(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(start: DateTime<Utc>, end: DateTime<Utc>) -> Snapshot {
        Snapshot {
            correlation_id: "c".into(),
            request_id: "r".into(),
            trace_id: "t".into(),
            request: RequestFacts::default(),
            principal: Principal::default(),
            start_time: start,
            end_time: end,
            response: ResponseFacts::default(),
            exception: None,
            log_entries: vec![],
            http_client_logs: vec![],
            notifications: vec![],
            db_query_count: 0,
        }
    }

    #[test]
    fn total_milliseconds_is_end_minus_start() {
        let start = Utc::now();
        let s = snapshot(start, start + Duration::milliseconds(250));
        assert_eq!(s.total_milliseconds(), 250);
    }

    #[test]
    fn total_milliseconds_clamps_clock_skew() {
        let start = Utc::now();
        let s = snapshot(start, start - Duration::milliseconds(5));
        assert_eq!(s.total_milliseconds(), 0);
    }
}
