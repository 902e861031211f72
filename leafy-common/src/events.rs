//! Event types for the Leafy event system
//!
//! Provides the training session phase, the LeafyEvent enum and the EventBus
//! used by the workflow controller to publish transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Training session phase
///
/// `Idle` and `Previewing` are driven by user commands, `Starting` through
/// `Finalizing` by status polling, `Completed` and `Errored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No session in progress, form editable
    Idle,
    /// Staged images displayed, awaiting confirm/cancel
    Previewing,
    /// Start command accepted, awaiting first status read
    Starting,
    /// Backend is fetching training images
    Downloading,
    /// Backend is building the dataset split
    Preparing,
    /// Backend is training the model
    TrainingRun,
    /// Backend is saving weights and labels
    Finalizing,
    /// Training finished successfully
    Completed,
    /// Training failed; status message carries the reason
    Errored,
}

impl Phase {
    /// Phases in which the status poller runs
    pub fn is_polling(&self) -> bool {
        matches!(
            self,
            Phase::Starting
                | Phase::Downloading
                | Phase::Preparing
                | Phase::TrainingRun
                | Phase::Finalizing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Errored)
    }

    /// Phases in which the label and image count may still change
    pub fn is_editable(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    /// Human readable phase name
    pub fn display_name(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Previewing => "Previewing",
            Phase::Starting => "Starting",
            Phase::Downloading => "Downloading images",
            Phase::Preparing => "Preparing dataset",
            Phase::TrainingRun => "Training",
            Phase::Finalizing => "Finalizing",
            Phase::Completed => "Completed",
            Phase::Errored => "Error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Leafy event types
///
/// Broadcast via EventBus; serializable so a front end can forward them as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LeafyEvent {
    /// Session moved to a different phase
    SessionPhaseChanged {
        label: String,
        old_phase: Phase,
        new_phase: Phase,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Status read returned the current phase with a new message
    SessionStatusUpdated {
        label: String,
        phase: Phase,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Preview or upload staged images for review
    PreviewReady {
        label: String,
        image_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Backend reported training completion
    TrainingCompleted {
        label: String,
        timestamp: DateTime<Utc>,
    },

    /// Backend reported a training error
    TrainingFailed {
        label: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Trained label set re-fetched from the backend
    LabelsRefreshed {
        labels: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A status tick failed; polling continues on the next tick
    StatusPollFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl LeafyEvent {
    /// Event type name (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            LeafyEvent::SessionPhaseChanged { .. } => "SessionPhaseChanged",
            LeafyEvent::SessionStatusUpdated { .. } => "SessionStatusUpdated",
            LeafyEvent::PreviewReady { .. } => "PreviewReady",
            LeafyEvent::TrainingCompleted { .. } => "TrainingCompleted",
            LeafyEvent::TrainingFailed { .. } => "TrainingFailed",
            LeafyEvent::LabelsRefreshed { .. } => "LabelsRefreshed",
            LeafyEvent::StatusPollFailed { .. } => "StatusPollFailed",
        }
    }

    /// True for events that end a training session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeafyEvent::TrainingCompleted { .. } | LeafyEvent::TrainingFailed { .. }
        )
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a tokio broadcast channel. Slow subscribers lose the
/// oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LeafyEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use leafy_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// let _rx = event_bus.subscribe();
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LeafyEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LeafyEvent) {
        let _ = self.tx.send(event);
    }
}
