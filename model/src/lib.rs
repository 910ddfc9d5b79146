pub mod models {
    pub mod exception;
    pub mod http_log;
    pub mod log_context;
    pub mod log_entry;
    pub mod notification;
    pub mod snapshot;
}

pub mod dtos {
    pub mod error_response;
}

pub use models::exception::{ExceptionChain, ExceptionRecord};
pub use models::http_log::{HttpRequestLogContext, body_placeholder, capture_body};
pub use models::log_context::LogContext;
pub use models::log_entry::{LogEntry, LogLevel};
pub use models::notification::Notification;
pub use models::snapshot::{HeaderMap, Principal, RequestFacts, ResponseFacts, Snapshot};
