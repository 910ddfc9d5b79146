use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use futures::future::{Ready, ready};
use model::{ExceptionChain, HttpRequestLogContext, LogEntry, Notification};

/// Query tally for one request, passed explicitly to whatever runs queries.
#[derive(Clone, Debug, Default)]
pub struct DbQueryCounter(Arc<AtomicU64>);

impl DbQueryCounter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct ContextState {
    log_entries: Vec<LogEntry>,
    http_client_logs: Vec<HttpRequestLogContext>,
    notifications: Vec<Notification>,
    exception: Option<ExceptionChain>,
}

/// Data collected while the request runs, handed to the snapshot.
#[derive(Debug, Default)]
pub struct CapturedData {
    pub log_entries: Vec<LogEntry>,
    pub http_client_logs: Vec<HttpRequestLogContext>,
    pub notifications: Vec<Notification>,
    pub exception: Option<ExceptionChain>,
    pub db_query_count: u64,
}

/// Per-request collection point.
///
/// Inserted into the request extensions by the extraction middleware and
/// available to handlers as an extractor. Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    state: Arc<Mutex<ContextState>>,
    db_queries: DbQueryCounter,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self, entry: LogEntry) {
        self.update(|state| state.log_entries.push(entry));
    }

    pub fn notify(&self, notification: Notification) {
        self.update(|state| state.notifications.push(notification));
    }

    pub fn record_http(&self, call: HttpRequestLogContext) {
        self.update(|state| state.http_client_logs.push(call));
    }

    /// Keeps the first error captured for the request.
    pub fn capture_error(&self, err: &(dyn std::error::Error + 'static)) {
        let chain = ExceptionChain::from_error(err);
        self.update(|state| {
            state.exception.get_or_insert(chain);
        });
    }

    pub fn has_error(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.exception.is_some())
            .unwrap_or(false)
    }

    pub fn db_queries(&self) -> DbQueryCounter {
        self.db_queries.clone()
    }

    /// Moves everything collected so far out of the context.
    pub fn take(&self) -> CapturedData {
        let state = self
            .state
            .lock()
            .map(|mut state| std::mem::take(&mut *state))
            .unwrap_or_default();
        CapturedData {
            log_entries: state.log_entries,
            http_client_logs: state.http_client_logs,
            notifications: state.notifications,
            exception: state.exception,
            db_query_count: self.db_queries.get(),
        }
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut ContextState),
    {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }
}

impl FromRequest for RequestContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let ctx = req.extensions().get::<RequestContext>().cloned();
        // outside the extraction middleware data is collected and dropped
        ready(Ok(ctx.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx_log;
    use model::LogLevel;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn clones_share_state() {
        let ctx = RequestContext::new();
        let handle = ctx.clone();
        handle.notify(Notification::new("field", "invalid"));
        handle.db_queries().increment();
        handle.db_queries().increment();

        let captured = ctx.take();
        assert_eq!(captured.notifications.len(), 1);
        assert_eq!(captured.db_query_count, 2);
    }

    #[test]
    fn take_empties_collected_lists() {
        let ctx = RequestContext::new();
        ctx.log(LogEntry::new("orders", LogLevel::Information, "one"));
        assert_eq!(ctx.take().log_entries.len(), 1);
        assert!(ctx.take().log_entries.is_empty());
    }

    #[test]
    fn first_error_wins() {
        let ctx = RequestContext::new();
        ctx.capture_error(&Boom);
        ctx.capture_error(&std::fmt::Error);
        assert!(ctx.has_error());
        let chain = ctx.take().exception.unwrap();
        assert_eq!(chain.errors[0].message, "boom");
    }

    #[test]
    fn ctx_log_records_location() {
        let ctx = RequestContext::new();
        ctx_log!(ctx, log::Level::Warn, "payments", "retrying {}", 3);
        let entries = ctx.take().log_entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "retrying 3");
        assert_eq!(entries[0].level, LogLevel::Warning);
        assert_eq!(entries[0].category, "payments");
        assert!(entries[0].member_name.contains("context"));
        assert!(entries[0].line_number.is_some());
    }
}
