//! Event types for the TIS event system
//!
//! Provides shared event definitions and the EventBus used to fan pipeline
//! progress out to SSE subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Per-file pipeline stage
///
/// UPLOADED → EXTRACTED → VALIDATED → STRUCTURED → (REVIEWED) → PERSISTED → DONE,
/// with ERROR reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStage {
    Uploaded,
    Extracted,
    Validated,
    Structured,
    Reviewed,
    Persisted,
    Done,
    Error,
}

impl ProcessingStage {
    /// Whether the stage ends processing for the file
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStage::Done | ProcessingStage::Error)
    }
}

/// TIS event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServiceEvent {
    /// A file was accepted for processing
    FileAccepted {
        run_id: Uuid,
        file_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A pipeline stage finished for a file
    StageCompleted {
        run_id: Uuid,
        file_name: String,
        stage: ProcessingStage,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The file is paused until a reviewer submits decisions
    ReviewRequested {
        run_id: Uuid,
        file_name: String,
        /// Number of degrees with at least one flagged course
        flagged_degrees: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Reviewer decisions arrived and the file resumed
    ReviewResolved {
        run_id: Uuid,
        file_name: String,
        decisions: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// File processed and persisted
    FileCompleted {
        run_id: Uuid,
        file_name: String,
        inserted: usize,
        duplicates: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// File processing ended with an error
    FileFailed {
        run_id: Uuid,
        file_name: String,
        stage: ProcessingStage,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ServiceEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ServiceEvent::FileAccepted { .. } => "FileAccepted",
            ServiceEvent::StageCompleted { .. } => "StageCompleted",
            ServiceEvent::ReviewRequested { .. } => "ReviewRequested",
            ServiceEvent::ReviewResolved { .. } => "ReviewResolved",
            ServiceEvent::FileCompleted { .. } => "FileCompleted",
            ServiceEvent::FileFailed { .. } => "FileFailed",
        }
    }

    /// File the event refers to
    pub fn file_name(&self) -> &str {
        match self {
            ServiceEvent::FileAccepted { file_name, .. }
            | ServiceEvent::StageCompleted { file_name, .. }
            | ServiceEvent::ReviewRequested { file_name, .. }
            | ServiceEvent::ReviewResolved { file_name, .. }
            | ServiceEvent::FileCompleted { file_name, .. }
            | ServiceEvent::FileFailed { file_name, .. } => file_name,
        }
    }
}

/// Broadcast bus for service events
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ServiceEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use tis_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ServiceEvent,
    ) -> Result<usize, broadcast::error::SendError<ServiceEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ServiceEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
