use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;

use crate::database::entities::upload_sessions;
use crate::ingest::PreviewRow;

pub const SESSION_ACTIVE: &str = "active";

#[derive(Clone, Debug)]
pub struct NewSession {
    pub session_id: String,
    pub owner_id: String,
    pub original_filename: String,
    pub object_key: String,
    pub file_url: String,
    pub content_type: String,
    pub file_size: i64,
    pub column_names: Vec<String>,
    pub preview_rows: Vec<PreviewRow>,
}

/// Durable record of uploaded datasets.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: NewSession) -> Result<upload_sessions::Model, DbErr>;

    /// Looks a session up on behalf of `owner_id`. Sessions owned by anyone else are
    /// reported as absent.
    async fn find_session(&self, session_id: &str, owner_id: &str) -> Result<Option<upload_sessions::Model>, DbErr>;
}

#[derive(Clone)]
pub struct DbSessionStore {
    db: DatabaseConnection,
}

impl DbSessionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn insert_session(&self, session: NewSession) -> Result<upload_sessions::Model, DbErr> {
        let column_names = serde_json::to_string(&session.column_names).map_err(|e| DbErr::Json(e.to_string()))?;
        let preview_data = serde_json::to_string(&session.preview_rows).map_err(|e| DbErr::Json(e.to_string()))?;
        let now = Utc::now();

        let model = upload_sessions::ActiveModel {
            session_id: Set(session.session_id),
            owner_id: Set(session.owner_id),
            original_filename: Set(session.original_filename),
            object_key: Set(session.object_key),
            file_url: Set(session.file_url),
            content_type: Set(session.content_type),
            file_size: Set(session.file_size),
            total_columns: Set(session.column_names.len() as i32),
            column_names: Set(column_names),
            preview_data: Set(preview_data),
            status: Set(SESSION_ACTIVE.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        model.insert(&self.db).await
    }

    async fn find_session(&self, session_id: &str, owner_id: &str) -> Result<Option<upload_sessions::Model>, DbErr> {
        upload_sessions::Entity::find()
            .filter(upload_sessions::Column::SessionId.eq(session_id))
            .filter(upload_sessions::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await
    }
}
