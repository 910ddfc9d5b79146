use std::future::Future;
use std::sync::Arc;

use common::env_config::MonitorConfig;
use common::error::Res;
use model::Snapshot;

use crate::builder::LogContextBuilder;
use crate::exception::ExceptionFormatter;
use crate::flusher::{Delivery, DeliveryOutcome};
use crate::masker::Masker;

/// Entry point the worker calls once per dequeued snapshot.
pub trait Notify: Send + Sync + 'static {
    fn notify(&self, snapshot: Snapshot) -> impl Future<Output = Res<()>> + Send;
}

/// Applies the configured toggles, builds the payload and delivers it.
#[derive(Debug)]
pub struct Notifier<D> {
    config: MonitorConfig,
    formatter: ExceptionFormatter,
    masker: Option<Arc<Masker>>,
    delivery: D,
}

impl<D: Delivery> Notifier<D> {
    pub fn new(
        config: MonitorConfig,
        formatter: ExceptionFormatter,
        masker: Option<Arc<Masker>>,
        delivery: D,
    ) -> Self {
        Self {
            config,
            formatter,
            masker,
            delivery,
        }
    }

    pub fn delivery(&self) -> &D {
        &self.delivery
    }

    fn builder(&self) -> LogContextBuilder {
        LogContextBuilder::new(self.formatter.clone(), self.masker.clone())
    }
}

impl<D: Delivery> Notify for Notifier<D> {
    async fn notify(&self, snapshot: Snapshot) -> Res<()> {
        let config = &self.config;
        if !config.enable_ned_monitor {
            return Ok(());
        }

        let mut builder = self.builder();
        builder.with_snapshot(snapshot);
        if config.enable_monitor_exceptions {
            builder.with_exception();
        }
        if config.enable_monitor_notifications {
            builder.with_notifications();
        }
        if config.enable_monitor_logs {
            builder.with_log_entries();
        }
        if config.enable_monitor_http_requests {
            builder.with_http_client_logs();
        }
        if config.enable_monitor_db_queries {
            builder.with_db_query_logs();
        }
        let context = builder.build()?;

        let outcome = self.delivery.flush(&context).await?;
        if outcome != DeliveryOutcome::Delivered {
            log::debug!("Monitor payload {} not delivered: {:?}", context.correlation_id, outcome);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::queue::tests::snapshot;
    use model::{ExceptionChain, LogContext, LogEntry, LogLevel, Notification};
    use std::sync::Mutex;

    /// Records every payload instead of sending it.
    #[derive(Default, Clone)]
    pub(crate) struct Recorder {
        pub sent: Arc<Mutex<Vec<LogContext>>>,
    }

    impl Delivery for Recorder {
        async fn flush(&self, context: &LogContext) -> Res<DeliveryOutcome> {
            self.sent.lock().unwrap().push(context.clone());
            Ok(DeliveryOutcome::Delivered)
        }
    }

    fn notifier(config: MonitorConfig) -> Notifier<Recorder> {
        Notifier::new(config, ExceptionFormatter::default(), None, Recorder::default())
    }

    fn loaded_snapshot() -> Snapshot {
        let mut s = snapshot("n1");
        s.exception = Some(ExceptionChain::new("OuterError", "outer"));
        s.log_entries = vec![LogEntry::new("orders", LogLevel::Warning, "slow")];
        s.notifications = vec![Notification::new("id", "unknown")];
        s.db_query_count = 2;
        s
    }

    #[tokio::test]
    async fn disabled_monitor_delivers_nothing() {
        let n = notifier(MonitorConfig {
            enable_ned_monitor: false,
            ..Default::default()
        });
        n.notify(loaded_snapshot()).await.unwrap();
        assert!(n.delivery().sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggles_select_sections() {
        let n = notifier(MonitorConfig {
            enable_monitor_exceptions: false,
            enable_monitor_http_requests: false,
            enable_monitor_notifications: true,
            enable_monitor_logs: false,
            enable_monitor_db_queries: true,
            ..Default::default()
        });
        n.notify(loaded_snapshot()).await.unwrap();

        let sent = n.delivery().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let ctx = &sent[0];
        assert!(ctx.exception.is_none());
        assert!(ctx.http_client_logs.is_none());
        assert!(ctx.log_entries.is_none());
        assert_eq!(ctx.notifications.as_ref().map(|n| n.len()), Some(1));
        assert_eq!(ctx.db_query_logs.as_ref().map(|d| d.query_count), Some(2));
    }

    #[tokio::test]
    async fn all_toggles_enabled_include_every_section() {
        let n = notifier(MonitorConfig::default());
        n.notify(loaded_snapshot()).await.unwrap();

        let sent = n.delivery().sent.lock().unwrap();
        let ctx = &sent[0];
        assert!(ctx.exception.is_some());
        assert!(ctx.http_client_logs.is_some());
        assert!(ctx.log_entries.is_some());
        assert!(ctx.notifications.is_some());
        assert!(ctx.db_query_logs.is_some());
    }
}
