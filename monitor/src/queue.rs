//! Unbounded ingestion queue between request handlers and the monitor worker.
//!
//! Producers never wait: `enqueue` either hands the snapshot to the channel or
//! drops it. There is exactly one [`SnapshotReader`], owned by the worker.

use model::Snapshot;
use tokio::sync::mpsc;

pub fn channel() -> (SnapshotQueue, SnapshotReader) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SnapshotQueue { tx }, SnapshotReader { rx })
}

/// Producer side, cloned into every request handler.
#[derive(Clone, Debug)]
pub struct SnapshotQueue {
    tx: mpsc::UnboundedSender<Snapshot>,
}

impl SnapshotQueue {
    /// Hands `snapshot` to the worker. Dropped silently once the worker
    /// has stopped.
    pub fn enqueue(&self, snapshot: Snapshot) {
        if let Err(mpsc::error::SendError(dropped)) = self.tx.send(snapshot) {
            log::debug!(
                "Monitor queue closed, dropping snapshot {}",
                dropped.correlation_id
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, FIFO.
#[derive(Debug)]
pub struct SnapshotReader {
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl SnapshotReader {
    /// Waits for the next snapshot. `None` once every producer is gone.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Refuses further snapshots; anything still buffered stays readable.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
