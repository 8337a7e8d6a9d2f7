use async_trait::async_trait;
use tracing::{error, info, warn};

use super::stage::{RunStage, UnitOutcome};

/// Receives run lifecycle events as they are persisted.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report_stage(&self, run_id: i32, stage: RunStage);
    async fn report_unit(&self, run_id: i32, unit: &str, outcome: UnitOutcome, error: Option<&str>);
    async fn report_completion(&self, run_id: i32, report_url: &str);
    async fn report_failure(&self, run_id: i32, error: &str);
}

/// Reporter that logs every event.
pub struct DefaultProgressReporter;

#[async_trait]
impl ProgressReporter for DefaultProgressReporter {
    async fn report_stage(&self, run_id: i32, stage: RunStage) {
        info!(run_id, stage = %stage, "Run advanced");
    }

    async fn report_unit(&self, run_id: i32, unit: &str, outcome: UnitOutcome, error: Option<&str>) {
        match (outcome, error) {
            (UnitOutcome::Failed, Some(error)) => warn!(run_id, unit = %unit, error = %error, "Unit failed"),
            (UnitOutcome::Failed, None) => warn!(run_id, unit = %unit, "Unit failed"),
            _ => info!(run_id, unit = %unit, outcome = ?outcome, "Unit finished"),
        }
    }

    async fn report_completion(&self, run_id: i32, report_url: &str) {
        info!(run_id, report_url = %report_url, "Run completed");
    }

    async fn report_failure(&self, run_id: i32, error: &str) {
        error!(run_id, error = %error, "Run failed");
    }
}
