//! Domain-specific error types.
//!
//! Every error classifies itself into an [`ErrorKind`], which decides how it is
//! propagated:
//!
//! - **InvalidInput**: rejected before anything is persisted (bad type, size, format)
//! - **UpstreamUnavailable**: object store, LLM or sandbox failures
//! - **UnitFailure**: isolated to one analysis unit, recorded and skipped
//! - **RunFailure**: ends a run in the `Failed` stage
//! - **NotFound**: unknown session or run
//!
//! # Examples
//!
//! ```rust
//! use deep_analysis::errors::{ErrorKind, UploadError};
//!
//! let err = UploadError::FileTooLarge { limit: 1024 };
//! assert_eq!(err.kind(), ErrorKind::InvalidInput);
//! assert_eq!(err.error_code(), "FILE_TOO_LARGE");
//! ```

pub mod analysis;
pub mod kind;
pub mod upload;
pub mod upstream;

pub use analysis::AnalysisError;
pub use kind::ErrorKind;
pub use upload::UploadError;
pub use upstream::{LlmError, ObjectStoreError, SandboxError};

/// Result type alias for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Result type alias for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;
