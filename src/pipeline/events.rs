//! In-process event bus for batch progress.
//!
//! Orchestrators emit events as they work; any number of subscribers (the CLI
//! progress line, tests) can listen. Emitting with no subscribers is a no-op,
//! and a lagging subscriber never blocks an emitter.

use serde::Serialize;
use tokio::sync::broadcast;

use super::batch::{BatchKind, BatchSummary, ItemReport};

pub type EventReceiver = broadcast::Receiver<PipelineEvent>;

/// Default per-subscriber buffer.
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event emitted after this call.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: PipelineEvent) {
        // send() only fails when nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    BatchStarted {
        kind: BatchKind,
        total: usize,
    },
    /// One item finished; `progress` is 0-100.
    ItemFinished {
        kind: BatchKind,
        completed: usize,
        total: usize,
        progress: u8,
        report: ItemReport,
    },
    BatchFinished {
        summary: BatchSummary,
    },
    /// The content library was modified; views should reload it.
    LibraryChanged,
}
