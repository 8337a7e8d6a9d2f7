//! Persistence of analysis runs and their unit results.
//!
//! Every write addresses a run by id. A write that matches no row means the run was
//! deleted by a newer start request, which is reported as
//! [`AnalysisError::RunSuperseded`] so the old worker can stop.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;

use crate::database::entities::{analysis_runs, analysis_unit_results};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::orchestrator::stage::RunStage;

#[derive(Clone, Debug)]
pub struct NewRun {
    pub session_id: String,
    pub owner_id: String,
    pub blob_url: String,
}

/// Field-level update of a run row. `None` leaves a column untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunUpdate {
    pub status: Option<RunStage>,
    pub sandbox_id: Option<String>,
    pub file_path: Option<String>,
    pub unit_list: Option<String>,
    pub unit_status: Option<String>,
    pub unit_errors: Option<String>,
    pub summary: Option<String>,
    pub report_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUnitResult {
    pub unit_name: String,
    pub business_analysis: String,
    pub code: Option<String>,
    pub code_explanation: Option<String>,
    pub chart_url: Option<String>,
    pub analysis_steps: String,
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: NewRun) -> AnalysisResult<analysis_runs::Model>;

    /// Deletes every run of a session together with its unit results.
    async fn delete_runs_for_session(&self, session_id: &str) -> AnalysisResult<u64>;

    async fn find_run(&self, run_id: i32) -> AnalysisResult<Option<analysis_runs::Model>>;

    /// The canonical run of a session: latest `created_at`, ties broken by id.
    async fn latest_run(&self, session_id: &str) -> AnalysisResult<Option<analysis_runs::Model>>;

    async fn update_run(&self, run_id: i32, update: RunUpdate) -> AnalysisResult<()>;

    async fn insert_unit_result(
        &self,
        run_id: i32,
        result: NewUnitResult,
    ) -> AnalysisResult<analysis_unit_results::Model>;

    /// Unit results of a run in insertion order.
    async fn unit_results(&self, run_id: i32) -> AnalysisResult<Vec<analysis_unit_results::Model>>;
}

#[derive(Clone)]
pub struct DbRunStore {
    db: DatabaseConnection,
}

impl DbRunStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RunStore for DbRunStore {
    async fn create_run(&self, run: NewRun) -> AnalysisResult<analysis_runs::Model> {
        let now = Utc::now();
        let model = analysis_runs::ActiveModel {
            session_id: Set(run.session_id),
            owner_id: Set(run.owner_id),
            status: Set(RunStage::Started.to_string()),
            blob_url: Set(run.blob_url),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn delete_runs_for_session(&self, session_id: &str) -> AnalysisResult<u64> {
        let run_ids: Vec<i32> = analysis_runs::Entity::find()
            .filter(analysis_runs::Column::SessionId.eq(session_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|run| run.id)
            .collect();
        if run_ids.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin().await?;
        analysis_unit_results::Entity::delete_many()
            .filter(analysis_unit_results::Column::RunId.is_in(run_ids.clone()))
            .exec(&txn)
            .await?;
        let deleted = analysis_runs::Entity::delete_many()
            .filter(analysis_runs::Column::Id.is_in(run_ids))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        Ok(deleted.rows_affected)
    }

    async fn find_run(&self, run_id: i32) -> AnalysisResult<Option<analysis_runs::Model>> {
        Ok(analysis_runs::Entity::find_by_id(run_id).one(&self.db).await?)
    }

    async fn latest_run(&self, session_id: &str) -> AnalysisResult<Option<analysis_runs::Model>> {
        Ok(analysis_runs::Entity::find()
            .filter(analysis_runs::Column::SessionId.eq(session_id))
            .order_by_desc(analysis_runs::Column::CreatedAt)
            .order_by_desc(analysis_runs::Column::Id)
            .one(&self.db)
            .await?)
    }

    async fn update_run(&self, run_id: i32, update: RunUpdate) -> AnalysisResult<()> {
        let mut model = analysis_runs::ActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        if let Some(status) = update.status {
            model.status = Set(status.to_string());
        }
        if let Some(sandbox_id) = update.sandbox_id {
            model.sandbox_id = Set(Some(sandbox_id));
        }
        if let Some(file_path) = update.file_path {
            model.file_path = Set(Some(file_path));
        }
        if let Some(unit_list) = update.unit_list {
            model.unit_list = Set(Some(unit_list));
        }
        if let Some(unit_status) = update.unit_status {
            model.unit_status = Set(Some(unit_status));
        }
        if let Some(unit_errors) = update.unit_errors {
            model.unit_errors = Set(Some(unit_errors));
        }
        if let Some(summary) = update.summary {
            model.summary = Set(Some(summary));
        }
        if let Some(report_url) = update.report_url {
            model.report_url = Set(Some(report_url));
        }
        if let Some(error) = update.error {
            model.error = Set(Some(error));
        }

        let result = analysis_runs::Entity::update_many()
            .set(model)
            .filter(analysis_runs::Column::Id.eq(run_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AnalysisError::RunSuperseded(run_id));
        }
        Ok(())
    }

    async fn insert_unit_result(
        &self,
        run_id: i32,
        result: NewUnitResult,
    ) -> AnalysisResult<analysis_unit_results::Model> {
        if self.find_run(run_id).await?.is_none() {
            return Err(AnalysisError::RunSuperseded(run_id));
        }

        let now = Utc::now();
        let model = analysis_unit_results::ActiveModel {
            run_id: Set(run_id),
            unit_name: Set(result.unit_name),
            business_analysis: Set(result.business_analysis),
            code: Set(result.code),
            code_explanation: Set(result.code_explanation),
            chart_url: Set(result.chart_url),
            analysis_steps: Set(result.analysis_steps),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn unit_results(&self, run_id: i32) -> AnalysisResult<Vec<analysis_unit_results::Model>> {
        Ok(analysis_unit_results::Entity::find()
            .filter(analysis_unit_results::Column::RunId.eq(run_id))
            .order_by_asc(analysis_unit_results::Column::Id)
            .all(&self.db)
            .await?)
    }
}
