//! Construction of the process-wide service handles.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::info;

use super::analysis_service::AnalysisService;
use super::error_log::{DbErrorLogStore, ErrorLogStore};
use super::run_store::{DbRunStore, RunStore};
use super::session_store::{DbSessionStore, SessionStore};
use super::upload_service::UploadService;
use crate::config::Config;
use crate::errors::ObjectStoreError;
use crate::ingest::ChunkedUploader;
use crate::llm::{LlmClient, OpenAiLlmClient};
use crate::orchestrator::{AnalysisOrchestrator, AnalysisWorker, DefaultProgressReporter, OrchestratorDeps, ProgressReporter};
use crate::sandbox::{ExecutionSandbox, OpenAiSandbox};
use crate::storage::{object_store_from_config, ObjectStore};

/// External collaborators the services are built on.
#[derive(Clone)]
pub struct Collaborators {
    pub object_store: Arc<dyn ObjectStore>,
    pub llm: Arc<dyn LlmClient>,
    pub sandbox: Arc<dyn ExecutionSandbox>,
    pub reporter: Arc<dyn ProgressReporter>,
}

impl Collaborators {
    pub fn from_config(config: &Config) -> Result<Self, ObjectStoreError> {
        Ok(Self {
            object_store: object_store_from_config(&config.object_store)?,
            llm: Arc::new(OpenAiLlmClient::new(config.llm.clone())),
            sandbox: Arc::new(OpenAiSandbox::new(&config.llm)),
            reporter: Arc::new(DefaultProgressReporter),
        })
    }
}

/// Service handles shared by every request.
#[derive(Clone)]
pub struct AppServices {
    pub uploads: UploadService,
    pub analysis: AnalysisService,
    pub errors: Arc<dyn ErrorLogStore>,
}

impl AppServices {
    /// Wires the services and starts the analysis worker. Must be called inside a
    /// Tokio runtime.
    pub fn start(db: DatabaseConnection, config: &Config, collaborators: Collaborators) -> (Self, JoinHandle<()>) {
        let sessions: Arc<dyn SessionStore> = Arc::new(DbSessionStore::new(db.clone()));
        let runs: Arc<dyn RunStore> = Arc::new(DbRunStore::new(db.clone()));
        let errors: Arc<dyn ErrorLogStore> = Arc::new(DbErrorLogStore::new(db));
        let uploader = ChunkedUploader::new(collaborators.object_store.clone(), config.upload);

        let orchestrator = AnalysisOrchestrator::new(
            OrchestratorDeps {
                runs: runs.clone(),
                llm: collaborators.llm,
                sandbox: collaborators.sandbox,
                uploader: uploader.clone(),
                reporter: collaborators.reporter,
                errors: errors.clone(),
            },
            config.analysis.clone(),
            config.llm.request_timeout,
        );
        let (queue, worker) = AnalysisWorker::spawn(Arc::new(orchestrator), config.analysis.queue_capacity);
        info!(
            max_units = config.analysis.max_units,
            queue_capacity = config.analysis.queue_capacity,
            "Analysis worker ready"
        );

        let services = Self {
            uploads: UploadService::new(uploader, sessions.clone()),
            analysis: AnalysisService::new(sessions, runs, queue),
            errors,
        };
        (services, worker)
    }
}
