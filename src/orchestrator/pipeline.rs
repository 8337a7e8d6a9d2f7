//! The analysis run state machine.
//!
//! A run moves `Started → FileStaged → UnitsProposed → SummaryGenerated →
//! ReportGenerated → Complete`. Units are analysed one at a time between
//! `UnitsProposed` and `SummaryGenerated`; a failing unit is recorded and skipped.
//! Any other error ends the run in `Failed`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use indexmap::IndexSet;
use tracing::{info, warn};

use super::extraction::ArtifactExtractor;
use super::progress::ProgressReporter;
use super::prompts;
use super::report::{render_report, report_units, ReportContext};
use super::run::RunRecorder;
use crate::config::AnalysisConfig;
use crate::database::entities::{analysis_unit_results, upload_sessions};
use crate::errors::{AnalysisError, AnalysisResult, LlmError};
use crate::ingest::ChunkedUploader;
use crate::llm::{parse_as, LlmClient, LlmRequest, LlmResponse, ModelTier, UnitAnalysis, UnitList};
use crate::sandbox::{acquire_sandbox, ExecutionSandbox};
use crate::services::error_log::{record_error, ErrorLogStore, NewErrorLog};
use crate::services::run_store::{NewUnitResult, RunStore};

/// One unit of work for the background worker.
#[derive(Clone, Debug)]
pub struct AnalysisJob {
    pub run_id: i32,
    pub session: upload_sessions::Model,
}

/// Process-scoped collaborators of the orchestrator.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub runs: Arc<dyn RunStore>,
    pub llm: Arc<dyn LlmClient>,
    pub sandbox: Arc<dyn ExecutionSandbox>,
    pub uploader: ChunkedUploader,
    pub reporter: Arc<dyn ProgressReporter>,
    pub errors: Arc<dyn ErrorLogStore>,
}

pub struct AnalysisOrchestrator {
    deps: OrchestratorDeps,
    config: AnalysisConfig,
    llm_timeout: Duration,
    extractor: ArtifactExtractor,
}

struct StagedFile {
    sandbox_id: String,
    path: String,
}

/// Trims, drops blanks and duplicates, then caps the list at `max_units`.
pub fn normalise_units(proposed: Vec<String>, max_units: usize) -> Vec<String> {
    proposed
        .into_iter()
        .map(|unit| unit.trim().to_string())
        .filter(|unit| !unit.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .take(max_units)
        .collect()
}

/// Chart key for the unit at `position`. Slugs alone can collide, the position cannot.
fn artifact_key(session_id: &str, run_id: i32, position: usize, unit: &str) -> String {
    let slug: String = unit
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("artifacts/{}/{}/{:02}_{}.png", session_id, run_id, position + 1, slug)
}

fn report_key(session_id: &str, run_id: i32) -> String {
    format!("reports/{}/{}.html", session_id, run_id)
}

impl AnalysisOrchestrator {
    pub fn new(deps: OrchestratorDeps, config: AnalysisConfig, llm_timeout: Duration) -> Self {
        let extractor = ArtifactExtractor::standard(deps.llm.clone(), llm_timeout);
        Self {
            deps,
            config,
            llm_timeout,
            extractor,
        }
    }

    /// Drives a run to a terminal stage. Never returns an error: failures end up on the
    /// run itself.
    pub async fn run(&self, job: AnalysisJob) {
        let run_id = job.run_id;
        let mut recorder = RunRecorder::new(run_id, self.deps.runs.clone(), self.deps.reporter.clone());
        info!(run_id, session_id = %job.session.session_id, "Analysis run started");

        match self.execute(&mut recorder, &job.session).await {
            Ok(()) => {}
            Err(AnalysisError::RunSuperseded(_)) => {
                info!(run_id, "Run was replaced by a newer run, stopping");
            }
            Err(e) => {
                let message = e.to_string();
                record_error(
                    self.deps.errors.as_ref(),
                    NewErrorLog::new("analysis run", message.clone()).for_run(&job.session.session_id, run_id),
                )
                .await;
                match recorder.fail(&message).await {
                    Ok(()) => {}
                    Err(AnalysisError::RunSuperseded(_)) => {
                        info!(run_id, "Run was replaced by a newer run, stopping");
                    }
                    Err(write_err) => {
                        warn!(run_id, error = %message, write_error = %write_err, "Could not record run failure");
                    }
                }
            }
        }
    }

    async fn execute(&self, recorder: &mut RunRecorder, session: &upload_sessions::Model) -> AnalysisResult<()> {
        let staged = self.stage_file(session).await?;
        recorder.mark_file_staged(&staged.sandbox_id, &staged.path).await?;

        let units = self.propose_units(session).await?;
        recorder.set_units(units.clone()).await?;

        for (position, unit) in units.iter().enumerate() {
            let attempt = match self.analyse_unit(session, recorder.run_id(), position, unit, &staged).await {
                Ok(result) => recorder.record_unit_result(result).await,
                Err(e) => Err(e),
            };
            match attempt {
                Ok(()) => {}
                Err(e @ AnalysisError::RunSuperseded(_)) => return Err(e),
                Err(e) => {
                    let message = e.to_string();
                    record_error(
                        self.deps.errors.as_ref(),
                        NewErrorLog::new(format!("analysis unit '{}'", unit), message.clone())
                            .for_run(&session.session_id, recorder.run_id()),
                    )
                    .await;
                    recorder.mark_unit_failed(unit, &message).await?
                }
            }
        }

        let results = self.deps.runs.unit_results(recorder.run_id()).await?;
        let summary = self.summarise(&results).await?;
        recorder.set_summary(summary.clone()).await?;

        let units = report_units(recorder.units(), recorder.outcomes(), &results);
        let context = ReportContext {
            title: format!("Deep analysis of {}", session.original_filename),
            file_name: session.original_filename.clone(),
            generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
            summary,
            units,
        };
        let report_url = self.publish_report(&session.session_id, recorder.run_id(), &context).await?;
        recorder.set_report(&report_url).await?;

        recorder.complete(&report_url).await
    }

    async fn with_deadline<T, F>(&self, operation: &str, call: F) -> AnalysisResult<T>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        match tokio::time::timeout(self.llm_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AnalysisError::Timeout {
                operation: operation.to_string(),
                after: self.llm_timeout,
            }),
        }
    }

    async fn stage_file(&self, session: &upload_sessions::Model) -> AnalysisResult<StagedFile> {
        let staging = async {
            let sandbox = acquire_sandbox(self.deps.sandbox.as_ref(), &self.config.sandbox_name).await?;
            let bytes = self.deps.uploader.store().read_full(&session.file_url).await?;
            let path = self
                .deps
                .sandbox
                .upload_file(&sandbox.id, &session.original_filename, bytes)
                .await?;
            Ok::<_, AnalysisError>(StagedFile {
                sandbox_id: sandbox.id,
                path,
            })
        };
        staging.await.map_err(|e| AnalysisError::Staging(e.to_string()))
    }

    async fn propose_units(&self, session: &upload_sessions::Model) -> AnalysisResult<Vec<String>> {
        let request = LlmRequest::new(prompts::unit_proposal_prompt(session, self.config.max_units))
            .with_instructions(prompts::UNIT_PROPOSAL_INSTRUCTIONS);
        let proposed = self
            .with_deadline("unit proposal", parse_as::<UnitList>(self.deps.llm.as_ref(), request))
            .await
            .map_err(|e| AnalysisError::UnitProposal(e.to_string()))?;

        let units = normalise_units(proposed.kpi_list, self.config.max_units);
        if units.is_empty() {
            return Err(AnalysisError::UnitProposal("no analysis units proposed".to_string()));
        }
        Ok(units)
    }

    async fn analyse_unit(
        &self,
        session: &upload_sessions::Model,
        run_id: i32,
        position: usize,
        unit: &str,
        staged: &StagedFile,
    ) -> AnalysisResult<NewUnitResult> {
        let request = LlmRequest::new(prompts::unit_analysis_prompt(unit, &staged.path))
            .with_instructions(prompts::UNIT_ANALYSIS_INSTRUCTIONS)
            .with_tier(ModelTier::Analysis)
            .with_sandbox(&staged.sandbox_id);
        let response: LlmResponse = self
            .with_deadline("unit analysis", self.deps.llm.generate(request))
            .await?;

        let mut chart_url = None;
        let mut image = None;
        if let Some(artifact) = self.extractor.extract(&response).await {
            let sandbox_id = artifact.sandbox_id.as_deref().unwrap_or(&staged.sandbox_id);
            let bytes = self.deps.sandbox.download_file(sandbox_id, &artifact.file_id).await?;
            image = Some(format!("data:image/png;base64,{}", STANDARD.encode(&bytes)));
            let uploaded = self
                .deps
                .uploader
                .upload_bytes(bytes, &artifact_key(&session.session_id, run_id, position, unit), "image/png")
                .await?;
            chart_url = Some(uploaded.url);
        }

        let mut request = LlmRequest::new(prompts::distill_prompt(unit, &response.output_text()))
            .with_instructions(prompts::DISTILL_INSTRUCTIONS);
        if let Some(image) = image {
            request = request.with_image(image);
        }
        let analysis = self
            .with_deadline("unit distillation", parse_as::<UnitAnalysis>(self.deps.llm.as_ref(), request))
            .await?;

        Ok(NewUnitResult {
            unit_name: unit.to_string(),
            business_analysis: analysis.business_analysis,
            code: Some(analysis.code).filter(|code| !code.trim().is_empty()),
            code_explanation: Some(analysis.code_explanation).filter(|text| !text.trim().is_empty()),
            chart_url,
            analysis_steps: analysis.analysis_steps,
        })
    }

    async fn summarise(&self, results: &[analysis_unit_results::Model]) -> AnalysisResult<String> {
        let request = LlmRequest::new(prompts::summary_prompt(results)).with_instructions(prompts::SUMMARY_INSTRUCTIONS);
        let response = self
            .with_deadline("summary", self.deps.llm.generate(request))
            .await
            .map_err(|e| AnalysisError::Summary(e.to_string()))?;

        let summary = response.output_text();
        if summary.trim().is_empty() {
            return Err(AnalysisError::Summary("empty summary".to_string()));
        }
        Ok(summary)
    }

    async fn publish_report(&self, session_id: &str, run_id: i32, context: &ReportContext) -> AnalysisResult<String> {
        let publishing = async {
            let html = render_report(context)?;
            let uploaded = self
                .deps
                .uploader
                .upload_bytes(html.into(), &report_key(session_id, run_id), "text/html")
                .await?;
            Ok::<_, AnalysisError>(uploaded.url)
        };
        publishing.await.map_err(|e| AnalysisError::Report(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_are_cleaned_and_capped() {
        let proposed = vec![
            " Sales by Region ".to_string(),
            "".to_string(),
            "Sales by Region".to_string(),
            "Churn".to_string(),
            "Margin".to_string(),
            "Growth".to_string(),
        ];
        assert_eq!(
            normalise_units(proposed, 3),
            vec!["Sales by Region", "Churn", "Margin"]
        );
        assert!(normalise_units(vec!["  ".to_string()], 5).is_empty());
    }

    #[test]
    fn object_keys_are_scoped_by_session_and_run() {
        assert_eq!(artifact_key("s1", 7, 0, "Sales by Region"), "artifacts/s1/7/01_sales_by_region.png");
        assert_eq!(report_key("s1", 7), "reports/s1/7.html");
    }

    #[test]
    fn similar_unit_names_get_distinct_chart_keys() {
        let keys: std::collections::HashSet<String> = ["Sales by Region", "Sales by region", "Sales-by-Region"]
            .iter()
            .enumerate()
            .map(|(position, unit)| artifact_key("s1", 1, position, unit))
            .collect();
        assert_eq!(keys.len(), 3);
    }
}
