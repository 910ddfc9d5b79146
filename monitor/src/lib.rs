//! Request monitor pipeline.
//!
//! Finished request snapshots are pushed onto an unbounded queue by the
//! capture middleware; one background worker drains it, builds the payload
//! (masking user-supplied data) and ships it to the collector.

use std::sync::Arc;

use common::env_config::MonitorConfig;
use common::error::Res;

pub mod builder;
pub mod exception;
pub mod flusher;
pub mod masker;
pub mod notifier;
pub mod queue;
pub mod worker;

pub use builder::LogContextBuilder;
pub use exception::{ExceptionAppendHook, ExceptionFormatter};
pub use flusher::{Delivery, DeliveryOutcome, Flusher};
pub use masker::Masker;
pub use notifier::{Notifier, Notify};
pub use queue::{SnapshotQueue, SnapshotReader};
pub use worker::MonitorWorker;

pub type DefaultWorker = MonitorWorker<Notifier<Flusher>>;

/// Wires queue, notifier and flusher from `config`.
///
/// The returned worker must be spawned by the caller; its `run` future
/// stops when the cancellation token passed to it fires.
pub fn setup(
    config: &MonitorConfig,
    append_hook: Option<ExceptionAppendHook>,
) -> Res<(SnapshotQueue, DefaultWorker)> {
    let masker = config
        .masking
        .as_ref()
        .map(Masker::new)
        .transpose()?
        .map(Arc::new);
    let flusher = Flusher::new(config)?;
    let notifier = Notifier::new(
        config.clone(),
        ExceptionFormatter::new(append_hook),
        masker,
        flusher,
    );

    let (queue, reader) = queue::channel();
    log::info!(
        "Monitor configured (enabled={}, endpoint={})",
        config.enable_ned_monitor,
        notifier.delivery().endpoint()
    );
    Ok((queue, MonitorWorker::new(reader, notifier)))
}
