//! Application Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// An application error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for application startup and commands.
pub type Result<T> = std::result::Result<T, Error>;

/// Which part of the application failed to start or run.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the record store")]
    Database,
    #[display("could not set up storage backend {_0}")]
    Storage(#[error(not(source))] String),
    #[display("could not set up notifications")]
    Notify,
    #[display("HTTP server error")]
    Server,
    #[display("reconciliation failed")]
    Reconcile,
}
