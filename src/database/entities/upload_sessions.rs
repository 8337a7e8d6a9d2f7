use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ingest::preview::PreviewRow;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub session_id: String,
    pub owner_id: String,
    pub original_filename: String,
    pub object_key: String,
    pub file_url: String,
    pub content_type: String,
    pub file_size: i64,
    pub total_columns: i32,
    /// JSON array of column names in file order
    pub column_names: String,
    /// JSON array of preview rows
    pub preview_data: String,
    pub status: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn column_names(&self) -> Vec<String> {
        serde_json::from_str(&self.column_names).unwrap_or_default()
    }

    pub fn preview_rows(&self) -> Vec<PreviewRow> {
        serde_json::from_str(&self.preview_data).unwrap_or_default()
    }
}
