//! Upload error types
//!
//! Errors raised while streaming a CSV file into the object store and recording its
//! upload session.
//!
//! # Examples
//!
//! ```rust
//! use deep_analysis::errors::UploadError;
//!
//! let err = UploadError::InvalidFormat("Missing header row".to_string());
//! assert!(err.is_client_error());
//! ```

use thiserror::Error;

use super::{ErrorKind, ObjectStoreError};

/// Upload pipeline errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// Only `.csv` files are accepted
    #[error("Only CSV files are allowed, got '{0}'")]
    InvalidFileType(String),

    /// Stream exceeded the configured maximum size
    #[error("File size too large. Maximum size is {limit} bytes")]
    FileTooLarge { limit: usize },

    /// First chunk could not be parsed as delimited text
    #[error("Invalid CSV: {0}")]
    InvalidFormat(String),

    /// First chunk was not valid UTF-8
    #[error("Invalid file encoding. Please ensure the file is UTF-8 encoded")]
    InvalidEncoding,

    /// Nothing was received
    #[error("CSV file is empty")]
    EmptyFile,

    /// Multipart body did not contain a file field
    #[error("Missing file field: {0}")]
    MissingFile(String),

    #[error("Storage error: {0}")]
    Storage(#[from] ObjectStoreError),

    /// The request body broke off or could not be decoded while streaming
    #[error("Upload stream could not be read: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::InvalidFileType(_)
            | UploadError::FileTooLarge { .. }
            | UploadError::InvalidFormat(_)
            | UploadError::InvalidEncoding
            | UploadError::EmptyFile
            | UploadError::MissingFile(_)
            | UploadError::Stream(_) => ErrorKind::InvalidInput,
            UploadError::Storage(err) => err.kind(),
            UploadError::Database(_) | UploadError::Json(_) => ErrorKind::Internal,
        }
    }

    /// Check if this is a client error (400-series)
    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::InvalidInput
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            UploadError::InvalidFileType(_) => "INVALID_FILE_TYPE",
            UploadError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            UploadError::InvalidFormat(_) | UploadError::InvalidEncoding | UploadError::EmptyFile => {
                "INVALID_FORMAT"
            }
            UploadError::MissingFile(_) => "VALIDATION_FAILED",
            UploadError::Storage(_) => "STORAGE_ERROR",
            UploadError::Stream(_) => "INVALID_REQUEST_BODY",
            UploadError::Database(_) => "DATABASE_ERROR",
            UploadError::Json(_) => "JSON_ERROR",
        }
    }
}
