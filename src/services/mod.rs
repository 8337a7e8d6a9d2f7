pub mod analysis_service;
pub mod context;
pub mod error_log;
pub mod projection;
pub mod run_store;
pub mod session_store;
pub mod upload_service;

pub use analysis_service::{AnalysisService, StartedRun};
pub use context::{AppServices, Collaborators};
pub use error_log::{record_error, DbErrorLogStore, ErrorLogStore, NewErrorLog};
pub use projection::{RunProjection, RunResults};
pub use run_store::{DbRunStore, NewRun, NewUnitResult, RunStore, RunUpdate};
pub use session_store::{DbSessionStore, NewSession, SessionStore};
pub use upload_service::{UploadReceipt, UploadService};
