//! Error types for leafy-client
//!
//! Transport failures are split three ways so callers can tell "no reply"
//! from "server said no" from "server said something unreadable".

use leafy_common::events::Phase;
use thiserror::Error;

/// Failure of a single backend request
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// No response at all (connectivity, DNS, server down, timeout)
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Server replied with a non-success status and (usually) an error payload
    #[error("Request rejected ({status}): {message}")]
    RejectedRequest {
        status: u16,
        message: String,
        /// Set when `POST /train/start` reports `already_trained: true`
        already_trained: bool,
    },

    /// Response body did not match the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    /// True when the server never replied
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, TransportError::NetworkUnreachable(_))
    }

    /// True for the start-training conflict on an existing label
    pub fn is_already_trained(&self) -> bool {
        matches!(
            self,
            TransportError::RejectedRequest {
                already_trained: true,
                ..
            }
        )
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            TransportError::NetworkUnreachable(_) => "Failed to connect to the server.".to_string(),
            TransportError::RejectedRequest { message, .. } => format!("Error: {}", message),
            TransportError::MalformedResponse(detail) => {
                format!("Unexpected response from server: {}", detail)
            }
        }
    }
}

/// Failure of a training workflow command
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    /// Label is empty after trimming
    #[error("Leaf name must not be empty")]
    InvalidLabel,

    /// Upload requested with no files selected
    #[error("No files selected for upload")]
    NoFilesStaged,

    /// Command not allowed in the current phase
    #[error("Cannot {action} while {phase:?}")]
    IllegalTransition { phase: Phase, action: &'static str },

    /// Session fields are frozen outside the editable phase
    #[error("Session is locked while {phase:?}; reset to change it")]
    SessionLocked { phase: Phase },

    /// Backend refused to start because the label is already trained
    #[error("'{label}' is already trained: {message}")]
    AlreadyTrained { label: String, message: String },

    /// Another preview, upload or start request has not answered yet
    #[error("Another request is still in progress")]
    CommandPending,

    /// Session was reset while the request was in flight; its result was dropped
    #[error("Request result discarded after reset")]
    Superseded,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl WorkflowError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::AlreadyTrained { label, .. } => format!(
                "'{}' is already trained. Choose a different name or delete the existing label first.",
                label
            ),
            WorkflowError::Transport(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
