//! Pull Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use golink_cache::Status;

/// A pull error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pull, publish and reconcile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies a pull failure.
///
/// ### Request Errors
/// Returned synchronously, before anything is mutated:
/// - [`ErrorKind::NotFound`]
/// - [`ErrorKind::InvalidState`]
/// - [`ErrorKind::AlreadyInProgress`]
/// - [`ErrorKind::InvalidRequest`]
///
/// ### Pipeline Errors
/// Absorbed into the record's `failed` state and its `error` column:
/// - [`ErrorKind::Fetch`]
/// - [`ErrorKind::HashFailed`]
/// - [`ErrorKind::Superseded`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Cache`]
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Notify`] - only ever logged.
/// - [`ErrorKind::Aborted`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("no file with uri {_0}")]
    NotFound(#[error(not(source))] String),
    #[display("file {_0} is not pullable (status: {_1})")]
    InvalidState(#[error(not(source))] String, #[error(not(source))] Status),
    #[display("an operation is already in progress for {_0}")]
    AlreadyInProgress(#[error(not(source))] String),
    #[display("invalid request: {_0}")]
    InvalidRequest(#[error(not(source))] String),
    #[display("could not fetch content from origin")]
    Fetch,
    #[display("could not hash content")]
    HashFailed,
    /// Another operation (usually the reconciler) changed the record's status
    /// while the pipeline was running.
    #[display("status of {_0} changed during the operation")]
    Superseded(#[error(not(source))] String),
    #[display("could not send notification")]
    Notify,
    #[display("record store error")]
    Cache,
    #[display("storage error")]
    Storage,
    /// The pipeline task panicked or was aborted.
    #[display("pipeline task did not finish")]
    Aborted,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AlreadyInProgress(_) | Self::Fetch | Self::Cache | Self::Storage)
    }
}
