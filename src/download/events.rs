//! Lifecycle events emitted by the download scheduler.
//!
//! Events go out on a `tokio::sync::broadcast` channel. Sending never blocks:
//! with no subscribers the event is dropped, and a subscriber that falls more
//! than the channel capacity behind sees `RecvError::Lagged` and loses the
//! oldest events.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use super::constants::EVENT_CHANNEL_CAPACITY;
use super::outcome::{BatchSummary, FailureKind};

/// Event emitted during a batch run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// A worker began fetching a resource.
    Started {
        /// Normalized URL.
        url: String,
        /// Position of the resource in the submitted list.
        index: usize,
    },

    /// An attempt failed and another will follow after `delay`.
    Retrying {
        /// Normalized URL.
        url: String,
        /// The attempt about to be made (2 for the first retry).
        attempt: u32,
        /// Backoff before that attempt.
        delay: Duration,
        /// Why the previous attempt failed.
        error: String,
    },

    /// One more resource finished, successfully or not.
    Progress {
        /// Resources finished so far.
        completed: usize,
        /// Resources in the batch.
        total: usize,
        /// `completed / total * 100`.
        percent: f32,
    },

    /// A resource was downloaded.
    Succeeded {
        /// Normalized URL.
        url: String,
        /// Chosen filename.
        filename: String,
        /// Payload size in bytes.
        size: u64,
        /// Whether it was served from cache.
        from_cache: bool,
    },

    /// A resource failed permanently.
    Failed {
        /// Normalized URL.
        url: String,
        /// Failure category.
        kind: FailureKind,
        /// Human-readable error.
        error: String,
    },

    /// Every resource has finished.
    BatchComplete {
        /// Final counters.
        summary: BatchSummary,
    },
}

impl DownloadEvent {
    /// Builds a progress event.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            (completed as f32 / total as f32) * 100.0
        };
        Self::Progress {
            completed,
            total,
            percent,
        }
    }
}

/// Creates an event channel with the default capacity.
///
/// Keep the receiver (or call `subscribe` on the sender) before the batch
/// starts; events sent with no live receiver are discarded.
#[must_use]
pub fn event_channel() -> (
    broadcast::Sender<DownloadEvent>,
    broadcast::Receiver<DownloadEvent>,
) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

/// Sends `event` if a sender is configured. Never blocks or fails.
pub(crate) fn emit(sender: Option<&broadcast::Sender<DownloadEvent>>, event: DownloadEvent) {
    if let Some(sender) = sender {
        // Err only means nobody is listening.
        sender.send(event).ok();
    }
}
