use indexmap::IndexMap;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::orchestrator::stage::{RunStage, UnitOutcome};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analysis_runs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub session_id: String,
    pub owner_id: String,
    pub status: String,
    pub blob_url: String,
    pub sandbox_id: Option<String>,
    pub file_path: Option<String>,
    /// JSON array of proposed unit names
    pub unit_list: Option<String>,
    /// JSON object of unit name to outcome code
    pub unit_status: Option<String>,
    /// JSON object of unit name to error text
    pub unit_errors: Option<String>,
    pub summary: Option<String>,
    pub report_url: Option<String>,
    pub error: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::analysis_unit_results::Entity")]
    UnitResults,
}

impl Related<super::analysis_unit_results::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UnitResults.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Unknown stage strings are reported as `Failed` so a corrupted row never looks live.
    pub fn stage(&self) -> RunStage {
        self.status.parse().unwrap_or(RunStage::Failed)
    }

    pub fn units(&self) -> Option<Vec<String>> {
        self.unit_list
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn unit_outcomes(&self) -> Option<IndexMap<String, UnitOutcome>> {
        self.unit_status
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn unit_error_map(&self) -> IndexMap<String, String> {
        self.unit_errors
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}
