//! Error types shared by every orchestration path.

use thiserror::Error;

/// Errors surfaced by the control plane.
///
/// A proxy config test failure is not represented here: it is reported as
/// [`Activation::Quarantined`](crate::nginx::activate::Activation) so that a
/// single bad resource never aborts its siblings.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Caller-supplied data violates an invariant. Never retried.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A referenced domain, service or node does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Certificate issuance or revocation failed.
    #[error("certificate error for {domain}: {reason}")]
    Certificate { domain: String, reason: String },

    /// Auth sidecar provisioning failed.
    #[error("auth sidecar error for {domain}: {reason}")]
    Sidecar { domain: String, reason: String },

    /// An external command exited unsuccessfully.
    #[error("command `{command}` failed: {output}")]
    Command { command: String, output: String },

    /// The record store rejected an operation.
    #[error("store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result type for control plane operations.
pub type ControlResult<T> = Result<T, ControlError>;
