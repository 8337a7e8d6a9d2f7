//! Errors raised by the external collaborators: object store, LLM service and
//! execution sandbox.

use std::time::Duration;

use thiserror::Error;

use super::ErrorKind;

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("Object {0} not found")]
    NotFound(String),

    #[error("Block {block_id} for {key} was rejected: {reason}")]
    BlockRejected {
        key: String,
        block_id: String,
        reason: String,
    },

    #[error("Commit of {key} failed: {reason}")]
    CommitFailed { key: String, reason: String },

    #[error("Object store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Object store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object location: {0}")]
    InvalidLocation(String),
}

impl ObjectStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ObjectStoreError::NotFound(_) => ErrorKind::NotFound,
            ObjectStoreError::InvalidLocation(_) => ErrorKind::Internal,
            _ => ErrorKind::UpstreamUnavailable,
        }
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM output did not match schema {schema}: {reason}")]
    Schema { schema: String, reason: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM service is not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::NotConfigured(_) => ErrorKind::Internal,
            _ => ErrorKind::UpstreamUnavailable,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            LlmError::Timeout(_) => true,
            LlmError::Http(err) => err.is_timeout(),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Sandbox request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sandbox service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Sandbox {0} is gone")]
    Expired(String),

    #[error("File {file_id} not found in sandbox {sandbox_id}")]
    FileNotFound { sandbox_id: String, file_id: String },

    #[error("Unexpected sandbox response: {0}")]
    InvalidResponse(String),
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::FileNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::UpstreamUnavailable,
        }
    }
}
