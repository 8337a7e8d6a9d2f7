use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::projection::{RunProjection, RunResults};
use super::run_store::{NewRun, RunStore};
use super::session_store::SessionStore;
use crate::database::entities::analysis_runs;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::orchestrator::{AnalysisJob, AnalysisQueue};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StartedRun {
    pub session_id: String,
    pub run_id: i32,
}

/// Entry point for starting runs and reading their progress.
#[derive(Clone)]
pub struct AnalysisService {
    sessions: Arc<dyn SessionStore>,
    runs: Arc<dyn RunStore>,
    queue: AnalysisQueue,
}

impl AnalysisService {
    pub fn new(sessions: Arc<dyn SessionStore>, runs: Arc<dyn RunStore>, queue: AnalysisQueue) -> Self {
        Self { sessions, runs, queue }
    }

    /// Replaces any previous run of the session with a fresh one and queues it.
    ///
    /// Returns as soon as the run is queued; progress is only visible through
    /// [`AnalysisService::status`].
    pub async fn start(&self, owner_id: &str, session_id: &str) -> AnalysisResult<StartedRun> {
        let session = self
            .sessions
            .find_session(session_id, owner_id)
            .await?
            .ok_or_else(|| AnalysisError::SessionNotFound(session_id.to_string()))?;

        let removed = self.runs.delete_runs_for_session(session_id).await?;
        if removed > 0 {
            info!(session_id = %session_id, removed, "Discarded previous analysis runs");
        }

        let run = self
            .runs
            .create_run(NewRun {
                session_id: session.session_id.clone(),
                owner_id: owner_id.to_string(),
                blob_url: session.file_url.clone(),
            })
            .await?;

        self.queue
            .submit(AnalysisJob {
                run_id: run.id,
                session,
            })
            .await?;

        Ok(StartedRun {
            session_id: session_id.to_string(),
            run_id: run.id,
        })
    }

    async fn owned_run(&self, owner_id: &str, session_id: &str, run_id: Option<i32>) -> AnalysisResult<analysis_runs::Model> {
        let run = match run_id {
            Some(run_id) => self
                .runs
                .find_run(run_id)
                .await?
                .filter(|run| run.session_id == session_id),
            None => self.runs.latest_run(session_id).await?,
        };
        run.filter(|run| run.owner_id == owner_id)
            .ok_or_else(|| AnalysisError::RunNotFound(session_id.to_string()))
    }

    pub async fn status(&self, owner_id: &str, session_id: &str, run_id: Option<i32>) -> AnalysisResult<RunProjection> {
        let run = self.owned_run(owner_id, session_id, run_id).await?;
        Ok(RunProjection::from(&run))
    }

    pub async fn results(&self, owner_id: &str, session_id: &str, run_id: Option<i32>) -> AnalysisResult<RunResults> {
        let run = self.owned_run(owner_id, session_id, run_id).await?;
        let results = self.runs.unit_results(run.id).await?;
        Ok(RunResults::new(&run, results))
    }
}
