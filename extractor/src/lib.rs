use middleware::extractor::ExtractionMiddleware;

pub mod client;
pub mod context;
pub mod principal;

pub mod middleware {
    pub mod extractor;
}

pub use client::{MonitoredClient, MonitoredResponse};
pub use context::{CapturedData, DbQueryCounter, RequestContext};

pub fn middleware() -> ExtractionMiddleware {
    ExtractionMiddleware::new()
}

/// Records a [`model::LogEntry`] on the request context and forwards the
/// message to the process logger.
///
/// ```ignore
/// ctx_log!(ctx, log::Level::Info, "orders", "loaded order {}", id);
/// ```
#[macro_export]
macro_rules! ctx_log {
    ($ctx:expr, $level:expr, $category:expr, $($arg:tt)+) => {{
        let level: $crate::__private::log::Level = $level;
        let message = format!($($arg)+);
        $crate::__private::log::log!(level, "{}", message);
        $ctx.log(
            $crate::__private::LogEntry::new($category, level.into(), message)
                .at(module_path!(), file!(), line!()),
        );
    }};
}

#[doc(hidden)]
pub mod __private {
    pub use log;
    pub use model::LogEntry;
}
