//! Analysis run error types
//!
//! Errors raised by the orchestrator, the run store and the analysis service.
//! Where an error is caught decides whether it is fatal: inside the per-unit loop it is
//! recorded against the unit, anywhere else it moves the run to `Failed`.

use std::time::Duration;

use thiserror::Error;

use super::{ErrorKind, LlmError, ObjectStoreError, SandboxError};
use crate::orchestrator::stage::{RunStage, UnitOutcome};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("No analysis run found for session {0}")]
    RunNotFound(String),

    /// The run row was deleted by a newer start request while this worker was active.
    #[error("Analysis run {0} was superseded by a newer run")]
    RunSuperseded(i32),

    #[error("File staging failed: {0}")]
    Staging(String),

    #[error("Unit proposal failed: {0}")]
    UnitProposal(String),

    #[error("Summary generation failed: {0}")]
    Summary(String),

    #[error("Report generation failed: {0}")]
    Report(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Cannot move run from {from} to {to}")]
    InvalidTransition { from: RunStage, to: RunStage },

    #[error("Unit '{unit}' already finished as {outcome:?}")]
    OutcomeFinal { unit: String, outcome: UnitOutcome },

    #[error("Unit '{0}' is not part of this run")]
    UnknownUnit(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Storage error: {0}")]
    Storage(#[from] ObjectStoreError),

    #[error("Upload error: {0}")]
    Upload(#[from] super::UploadError),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("Analysis queue is closed")]
    QueueClosed,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::SessionNotFound(_) | AnalysisError::RunNotFound(_) => ErrorKind::NotFound,
            AnalysisError::Staging(_)
            | AnalysisError::UnitProposal(_)
            | AnalysisError::Summary(_)
            | AnalysisError::Report(_) => ErrorKind::RunFailure,
            AnalysisError::Timeout { .. } => ErrorKind::UpstreamUnavailable,
            AnalysisError::Llm(err) => err.kind(),
            AnalysisError::Sandbox(err) => err.kind(),
            AnalysisError::Storage(err) => err.kind(),
            AnalysisError::Upload(err) => err.kind(),
            AnalysisError::RunSuperseded(_)
            | AnalysisError::InvalidTransition { .. }
            | AnalysisError::OutcomeFinal { .. }
            | AnalysisError::UnknownUnit(_)
            | AnalysisError::Database(_)
            | AnalysisError::Serialization(_)
            | AnalysisError::Template(_)
            | AnalysisError::QueueClosed => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            AnalysisError::Timeout { .. } => true,
            AnalysisError::Llm(err) => err.is_timeout(),
            _ => false,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidInput => "VALIDATION_FAILED",
            ErrorKind::UpstreamUnavailable => "SERVICE_ERROR",
            ErrorKind::UnitFailure => "UNIT_FAILED",
            ErrorKind::RunFailure => "RUN_FAILED",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}
