use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analysis_unit_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub run_id: i32,
    pub unit_name: String,
    pub business_analysis: String,
    pub code: Option<String>,
    pub code_explanation: Option<String>,
    pub chart_url: Option<String>,
    pub analysis_steps: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis_runs::Entity",
        from = "Column::RunId",
        to = "super::analysis_runs::Column::Id"
    )]
    AnalysisRuns,
}

impl Related<super::analysis_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
