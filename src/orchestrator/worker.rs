//! Background execution of analysis runs.
//!
//! Request handlers hand jobs to an [`AnalysisQueue`] and return; the worker owns each
//! run from then on, including writing its terminal stage.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::pipeline::{AnalysisJob, AnalysisOrchestrator};
use crate::errors::{AnalysisError, AnalysisResult};

/// Sending half of the worker queue.
#[derive(Clone)]
pub struct AnalysisQueue {
    sender: mpsc::Sender<AnalysisJob>,
}

impl AnalysisQueue {
    pub async fn submit(&self, job: AnalysisJob) -> AnalysisResult<()> {
        self.sender
            .send(job)
            .await
            .map_err(|_| AnalysisError::QueueClosed)
    }
}

pub struct AnalysisWorker {
    receiver: mpsc::Receiver<AnalysisJob>,
    orchestrator: Arc<AnalysisOrchestrator>,
}

impl AnalysisWorker {
    pub fn new(orchestrator: Arc<AnalysisOrchestrator>, capacity: usize) -> (AnalysisQueue, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (AnalysisQueue { sender }, Self { receiver, orchestrator })
    }

    /// Starts the worker loop. Each job runs in its own task, so runs for different
    /// sessions proceed concurrently.
    pub fn spawn(orchestrator: Arc<AnalysisOrchestrator>, capacity: usize) -> (AnalysisQueue, JoinHandle<()>) {
        let (queue, worker) = Self::new(orchestrator, capacity);
        (queue, tokio::spawn(worker.run()))
    }

    pub async fn run(mut self) {
        info!("Analysis worker started");
        while let Some(job) = self.receiver.recv().await {
            debug!(run_id = job.run_id, "Dispatching analysis run");
            let orchestrator = self.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator.run(job).await;
            });
        }
        info!("Analysis worker stopped");
    }
}
