//! Error and result types for cumulus-storage.
//!

use std::io;
use std::io::ErrorKind;

use thiserror::Error;

/// The result type for storage.
pub type Result<T> = core::result::Result<T, StorageError>;

/// Storage error type.
#[derive(Error, Debug)]
pub enum StorageError {
  #[error("key not found in storage: `{0}`")]
  KeyNotFound(String),

  #[error("configuration error: `{0}`")]
  Configuration(String),

  #[error("malformed private key: `{0}`")]
  KeyFormat(String),

  #[error("upload returned status `{0}` for key: `{1}`")]
  Upload(u16, String),

  #[error("operation on closed handle for key: `{0}`")]
  ClosedHandle(String),

  #[error("transport error: `{0}`")]
  Transport(String),

  #[error("response error: `{0}`")]
  Response(String),

  #[error("`{0}`")]
  InvalidInput(String),

  #[error("parsing url: `{0}`")]
  UrlParse(String),

  #[error("`{0}`: `{1}`")]
  IoError(String, io::Error),
}

impl From<StorageError> for io::Error {
  fn from(err: StorageError) -> Self {
    match err {
      StorageError::IoError(_, ref io_error) => Self::new(io_error.kind(), err),
      err @ StorageError::KeyNotFound(_) => Self::new(ErrorKind::NotFound, err),
      err => Self::other(err),
    }
  }
}

impl From<io::Error> for StorageError {
  fn from(error: io::Error) -> Self {
    Self::IoError("io error".to_string(), error)
  }
}

impl From<reqwest::Error> for StorageError {
  fn from(error: reqwest::Error) -> Self {
    Self::Transport(error.to_string())
  }
}
