//! Synchronization Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Failures in the storage, compression and provider
//! layers are raised into one of the dependency variants below, keeping the
//! original error as a child frame.

use derive_more::{Display, Error};

/// A synchronization error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a synchronization failure.
///
/// ### Operational Errors
/// - [`ErrorKind::VersionMismatch`]
/// - [`ErrorKind::UnsupportedSource`]
/// - [`ErrorKind::MissingGroup`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Cache`]
/// - [`ErrorKind::Metadata`]
/// - [`ErrorKind::Provider`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A staged filesystem operation (read, write, rename, remove) failed.
    #[display("storage operation failed")]
    Storage,
    /// The episode cache could not be read, decoded or encoded.
    #[display("invalid episode cache")]
    Cache,
    /// The novel metadata file (`index.json`) could not be decoded or encoded.
    #[display("invalid novel metadata")]
    Metadata,
    /// The metadata file uses a legacy schema; re-run with `--overwrite`.
    #[display("metadata uses a legacy schema, pass --overwrite to migrate it")]
    VersionMismatch,
    /// The provider failed to fetch metadata, the chapter index or chapter content.
    #[display("provider error")]
    Provider,
    /// No registered provider understands the given source.
    #[display("no provider for source: {_0}")]
    UnsupportedSource(#[error(not(source))] String),
    /// A chapter refers to a group folder that was never set up.
    #[display("no folder for group {_0}")]
    MissingGroup(#[error(not(source))] usize),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider | Self::Storage)
    }
}
