//! Durable record of failures.
//!
//! Server errors and failed runs or units each leave one row, so a `reference` shown to a
//! caller can be traced back to the full message.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;
use tracing::warn;
use uuid::Uuid;

use crate::database::entities::error_logs;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewErrorLog {
    pub reference: String,
    pub location: String,
    pub message: String,
    pub session_id: Option<String>,
    pub run_id: Option<i32>,
}

impl NewErrorLog {
    /// Entry with a fresh reference.
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reference: Uuid::new_v4().to_string(),
            location: location.into(),
            message: message.into(),
            session_id: None,
            run_id: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn for_run(mut self, session_id: impl Into<String>, run_id: i32) -> Self {
        self.session_id = Some(session_id.into());
        self.run_id = Some(run_id);
        self
    }
}

#[async_trait]
pub trait ErrorLogStore: Send + Sync {
    async fn record(&self, entry: NewErrorLog) -> Result<error_logs::Model, DbErr>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<error_logs::Model>, DbErr>;

    /// Entries of one run, oldest first.
    async fn for_run(&self, run_id: i32) -> Result<Vec<error_logs::Model>, DbErr>;
}

#[derive(Clone)]
pub struct DbErrorLogStore {
    db: DatabaseConnection,
}

impl DbErrorLogStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ErrorLogStore for DbErrorLogStore {
    async fn record(&self, entry: NewErrorLog) -> Result<error_logs::Model, DbErr> {
        let model = error_logs::ActiveModel {
            reference: Set(entry.reference),
            location: Set(entry.location),
            message: Set(entry.message),
            session_id: Set(entry.session_id),
            run_id: Set(entry.run_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        model.insert(&self.db).await
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<error_logs::Model>, DbErr> {
        error_logs::Entity::find()
            .filter(error_logs::Column::Reference.eq(reference))
            .one(&self.db)
            .await
    }

    async fn for_run(&self, run_id: i32) -> Result<Vec<error_logs::Model>, DbErr> {
        error_logs::Entity::find()
            .filter(error_logs::Column::RunId.eq(run_id))
            .order_by_asc(error_logs::Column::Id)
            .all(&self.db)
            .await
    }
}

/// Records `entry`. A failed write is logged and otherwise ignored, so it never masks
/// the error being recorded.
pub async fn record_error(store: &dyn ErrorLogStore, entry: NewErrorLog) {
    let reference = entry.reference.clone();
    if let Err(e) = store.record(entry).await {
        warn!(reference = %reference, error = %e, "Failed to persist error log entry");
    }
}
