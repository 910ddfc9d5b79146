use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain notification raised by a handler, e.g. a validation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub key: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Notification {
            key: key.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}
