//! Dispatcher error types.

use thiserror::Error;

/// Errors surfaced by transaction construction and dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Destination id outside the valid 1–232 range
    #[error("destination id {0} outside the valid 1-232 range")]
    InvalidDestination(u8),

    /// No terminal state was reached within the overall send budget
    #[error("no response within the overall send timeout")]
    Timeout,

    /// The transaction reached the `Failed` state: its retry budget ran out
    /// or the destination negatively acknowledged it
    #[error("transaction failed after {attempts} attempts")]
    Failed {
        /// Send attempts made before giving up
        attempts: u32,
    },

    /// The transaction was cancelled before completing
    #[error("transaction cancelled")]
    Cancelled,

    /// The link-layer side of the outbound channel is gone
    #[error("transport channel closed")]
    TransportClosed,
}
