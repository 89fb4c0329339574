use std::io::Error as IoError;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

/// An error reported by a provider. Callers treat it as opaque and raise it
/// into [`ErrorKind::Provider`](crate::error::ErrorKind::Provider).
pub type ProviderError = exn::Exn<ErrorKind>;
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("source not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("malformed source data: {_0}")]
    InvalidData(#[error(not(source))] String),
    #[display("chapter content unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    #[display("I/O error")]
    Io(IoError),
}

impl ErrorKind {
    pub(crate) fn from_io(e: IoError, path: &Path) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io(e),
        }
    }
}
