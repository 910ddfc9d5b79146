//! The single background task draining the ingestion queue.
//!
//! ```text
//!  request handlers ──enqueue──► SnapshotQueue ──► MonitorWorker ──► Notify
//!     (many)                      (unbounded)        (one)          build + flush
//! ```
//!
//! Items are processed one at a time, in arrival order. A failing or
//! panicking item is logged and skipped. On cancellation the worker stops
//! between items and whatever is still queued is discarded.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use model::Snapshot;
use tokio_util::sync::CancellationToken;

use crate::notifier::Notify;
use crate::queue::SnapshotReader;

pub struct MonitorWorker<N> {
    reader: SnapshotReader,
    notifier: N,
}

impl<N: Notify> MonitorWorker<N> {
    pub fn new(reader: SnapshotReader, notifier: N) -> Self {
        Self { reader, notifier }
    }

    /// Runs until `cancel` fires or every producer is gone.
    pub async fn run(mut self, cancel: CancellationToken) {
        log::info!("Monitor worker started");
        let mut processed: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!(
                        "Monitor worker stopping, {} snapshot(s) left undelivered",
                        self.reader.len()
                    );
                    break;
                }
                next = self.reader.next() => next,
            };

            match next {
                Some(snapshot) => {
                    self.process(snapshot).await;
                    processed += 1;
                }
                None => {
                    log::info!("Monitor queue closed by all producers");
                    break;
                }
            }
        }

        self.reader.close();
        log::info!("Monitor worker stopped after {} snapshot(s)", processed);
    }

    async fn process(&self, snapshot: Snapshot) {
        let correlation_id = snapshot.correlation_id.clone();
        let result = AssertUnwindSafe(self.notifier.notify(snapshot))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!(
                    "Monitor failed to process snapshot {}: {}\n{:?}",
                    correlation_id,
                    e,
                    e
                );
            }
            Err(panic) => {
                log::error!(
                    "Monitor panicked while processing snapshot {}: {}",
                    correlation_id,
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
