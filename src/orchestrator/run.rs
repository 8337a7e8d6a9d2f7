//! Single writer of an analysis run.
//!
//! All mutations of a run go through [`RunRecorder`], which holds the in-memory copy of
//! the stage and the unit outcome map. Each method validates the transition before
//! writing, so stages only move forward and unit outcomes only leave `Pending` once.

use std::sync::Arc;

use indexmap::IndexMap;

use super::progress::ProgressReporter;
use super::stage::{RunStage, UnitOutcome};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::services::run_store::{NewUnitResult, RunStore, RunUpdate};

pub struct RunRecorder {
    run_id: i32,
    stage: RunStage,
    units: Vec<String>,
    outcomes: IndexMap<String, UnitOutcome>,
    errors: IndexMap<String, String>,
    store: Arc<dyn RunStore>,
    reporter: Arc<dyn ProgressReporter>,
}

impl RunRecorder {
    /// Wraps a freshly created run, which is always in `Started`.
    pub fn new(run_id: i32, store: Arc<dyn RunStore>, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            run_id,
            stage: RunStage::Started,
            units: Vec::new(),
            outcomes: IndexMap::new(),
            errors: IndexMap::new(),
            store,
            reporter,
        }
    }

    pub fn run_id(&self) -> i32 {
        self.run_id
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn outcome(&self, unit: &str) -> Option<UnitOutcome> {
        self.outcomes.get(unit).copied()
    }

    pub fn outcomes(&self) -> &IndexMap<String, UnitOutcome> {
        &self.outcomes
    }

    fn check_transition(&self, to: RunStage) -> AnalysisResult<()> {
        if self.stage.can_advance_to(to) {
            Ok(())
        } else {
            Err(AnalysisError::InvalidTransition { from: self.stage, to })
        }
    }

    async fn advance(&mut self, to: RunStage, mut update: RunUpdate) -> AnalysisResult<()> {
        self.check_transition(to)?;
        update.status = Some(to);
        self.store.update_run(self.run_id, update).await?;
        self.stage = to;
        self.reporter.report_stage(self.run_id, to).await;
        Ok(())
    }

    pub async fn mark_file_staged(&mut self, sandbox_id: &str, file_path: &str) -> AnalysisResult<()> {
        self.advance(
            RunStage::FileStaged,
            RunUpdate {
                sandbox_id: Some(sandbox_id.to_string()),
                file_path: Some(file_path.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Fixes the unit list and starts every unit as `Pending`.
    pub async fn set_units(&mut self, units: Vec<String>) -> AnalysisResult<()> {
        self.check_transition(RunStage::UnitsProposed)?;
        let outcomes: IndexMap<String, UnitOutcome> = units
            .iter()
            .map(|unit| (unit.clone(), UnitOutcome::Pending))
            .collect();

        self.advance(
            RunStage::UnitsProposed,
            RunUpdate {
                unit_list: Some(serde_json::to_string(&units)?),
                unit_status: Some(serde_json::to_string(&outcomes)?),
                unit_errors: Some("{}".to_string()),
                ..Default::default()
            },
        )
        .await?;

        self.units = units;
        self.outcomes = outcomes;
        Ok(())
    }

    fn check_outcome(&self, unit: &str, target: UnitOutcome) -> AnalysisResult<()> {
        let current = self
            .outcomes
            .get(unit)
            .copied()
            .ok_or_else(|| AnalysisError::UnknownUnit(unit.to_string()))?;
        if current.can_transition_to(target) {
            Ok(())
        } else {
            Err(AnalysisError::OutcomeFinal {
                unit: unit.to_string(),
                outcome: current,
            })
        }
    }

    async fn write_outcome(&mut self, unit: &str, outcome: UnitOutcome, error: Option<String>) -> AnalysisResult<()> {
        let mut outcomes = self.outcomes.clone();
        outcomes.insert(unit.to_string(), outcome);
        let mut errors = self.errors.clone();
        if let Some(error) = &error {
            errors.insert(unit.to_string(), error.clone());
        }

        self.store
            .update_run(
                self.run_id,
                RunUpdate {
                    unit_status: Some(serde_json::to_string(&outcomes)?),
                    unit_errors: error.as_ref().map(|_| serde_json::to_string(&errors)).transpose()?,
                    ..Default::default()
                },
            )
            .await?;

        self.outcomes = outcomes;
        self.errors = errors;
        self.reporter
            .report_unit(self.run_id, unit, outcome, error.as_deref())
            .await;
        Ok(())
    }

    /// Appends a unit's result and marks the unit `Done`.
    pub async fn record_unit_result(&mut self, result: NewUnitResult) -> AnalysisResult<()> {
        let unit = result.unit_name.clone();
        self.check_outcome(&unit, UnitOutcome::Done)?;
        self.store.insert_unit_result(self.run_id, result).await?;
        self.write_outcome(&unit, UnitOutcome::Done, None).await
    }

    pub async fn mark_unit_failed(&mut self, unit: &str, error: &str) -> AnalysisResult<()> {
        self.check_outcome(unit, UnitOutcome::Failed)?;
        self.write_outcome(unit, UnitOutcome::Failed, Some(error.to_string()))
            .await
    }

    pub async fn set_summary(&mut self, summary: String) -> AnalysisResult<()> {
        self.advance(
            RunStage::SummaryGenerated,
            RunUpdate {
                summary: Some(summary),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_report(&mut self, report_url: &str) -> AnalysisResult<()> {
        self.advance(
            RunStage::ReportGenerated,
            RunUpdate {
                report_url: Some(report_url.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn complete(&mut self, report_url: &str) -> AnalysisResult<()> {
        self.advance(RunStage::Complete, RunUpdate::default()).await?;
        self.reporter.report_completion(self.run_id, report_url).await;
        Ok(())
    }

    pub async fn fail(&mut self, error: &str) -> AnalysisResult<()> {
        self.advance(
            RunStage::Failed,
            RunUpdate {
                error: Some(error.to_string()),
                ..Default::default()
            },
        )
        .await?;
        self.reporter.report_failure(self.run_id, error).await;
        Ok(())
    }
}
