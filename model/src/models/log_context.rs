use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::http_log::HttpRequestLogContext;
use super::log_entry::LogEntry;
use super::notification::Notification;
use super::snapshot::HeaderMap;

/// Payload shipped to the collector.
///
/// Optional sections are left out of the JSON document entirely when they
/// were not enabled, never written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContext {
    pub correlation_id: String,
    pub request_id: String,
    pub trace_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_milliseconds: i64,
    pub request: RequestSection,
    pub user: UserSection,
    pub response: ResponseSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Vec<Notification>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_entries: Option<Vec<LogEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_client_logs: Option<Vec<HttpRequestLogContext>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_query_logs: Option<DbQuerySection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSection {
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

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSection {
    pub roles: Vec<String>,
    pub claims: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSection {
    pub status_code: u16,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub body_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionSection {
    pub type_name: String,
    pub message: String,
    /// Rendered chain, including the `Base Exception:` section.
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbQuerySection {
    pub query_count: u64,
}
