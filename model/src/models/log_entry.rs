use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => LogLevel::Trace,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Info => LogLevel::Information,
            log::Level::Warn => LogLevel::Warning,
            log::Level::Error => LogLevel::Error,
        }
    }
}

/// One structured log line written while a request was running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub category: String,
    pub level: LogLevel,
    pub message: String,
    pub member_name: String,
    pub member_type: String,
    pub line_number: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(category: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        LogEntry {
            category: category.into(),
            level,
            message: message.into(),
            member_name: String::new(),
            member_type: String::new(),
            line_number: None,
            created_at: Utc::now(),
        }
    }

    /// Best-effort source location of the call that produced the entry.
    pub fn at(mut self, member_name: &str, member_type: &str, line: u32) -> Self {
        self.member_name = member_name.to_string();
        self.member_type = member_type.to_string();
        self.line_number = Some(line);
        self
    }
}
