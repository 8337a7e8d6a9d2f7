use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncRead;
use tracing::{info, warn};
use uuid::Uuid;

use super::session_store::{NewSession, SessionStore};
use crate::errors::{UploadError, UploadResult};
use crate::ingest::{ChunkedUploader, PreviewRow};

/// What the caller learns about a stored upload.
#[derive(Clone, Debug, Serialize)]
pub struct UploadReceipt {
    pub session_id: String,
    pub file_url: String,
    pub file_name: String,
    pub column_names: Vec<String>,
    pub total_columns: usize,
    pub file_size: u64,
    pub preview_data: Vec<PreviewRow>,
}

#[derive(Clone)]
pub struct UploadService {
    uploader: ChunkedUploader,
    sessions: Arc<dyn SessionStore>,
}

/// Drops any directory part a client put into the file name.
pub fn base_file_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim()
}

pub fn validate_file_name(file_name: &str) -> UploadResult<()> {
    let name = base_file_name(file_name);
    let is_csv = name.len() > 4 && name.to_ascii_lowercase().ends_with(".csv");
    if is_csv {
        Ok(())
    } else {
        Err(UploadError::InvalidFileType(file_name.to_string()))
    }
}

impl UploadService {
    pub fn new(uploader: ChunkedUploader, sessions: Arc<dyn SessionStore>) -> Self {
        Self { uploader, sessions }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.uploader.limits().max_upload_bytes
    }

    /// Streams a CSV file into the object store and records its session.
    ///
    /// The session is written only after the object is committed. If that write fails the
    /// object is deleted again, so no session ever points at a missing object.
    pub async fn upload_csv<R>(&self, owner_id: &str, file_name: &str, reader: R) -> UploadResult<UploadReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        validate_file_name(file_name)?;
        let file_name = base_file_name(file_name).to_string();

        let session_id = Uuid::new_v4().to_string();
        let key = format!(
            "uploads/{}_{}_{}",
            session_id,
            Utc::now().format("%Y%m%d%H%M%S"),
            file_name
        );

        let outcome = self.uploader.upload_csv(reader, &key).await?;
        let preview = outcome.preview.unwrap_or_default();

        let new_session = NewSession {
            session_id: session_id.clone(),
            owner_id: owner_id.to_string(),
            original_filename: file_name.clone(),
            object_key: key.clone(),
            file_url: outcome.url.clone(),
            content_type: "text/csv".to_string(),
            file_size: outcome.stats.total_bytes as i64,
            column_names: preview.column_names.clone(),
            preview_rows: preview.rows.clone(),
        };

        if let Err(e) = self.sessions.insert_session(new_session).await {
            if let Err(delete_err) = self.uploader.store().delete(&key).await {
                warn!(key = %key, error = %delete_err, "Failed to delete object after session write failed");
            }
            return Err(e.into());
        }

        info!(
            session_id = %session_id,
            owner_id = %owner_id,
            bytes = outcome.stats.total_bytes,
            columns = preview.total_columns(),
            "Upload session created"
        );

        Ok(UploadReceipt {
            session_id,
            file_url: outcome.url,
            file_name,
            total_columns: preview.total_columns(),
            column_names: preview.column_names,
            file_size: outcome.stats.total_bytes,
            preview_data: preview.rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_csv_names_are_accepted() {
        assert!(validate_file_name("sales.csv").is_ok());
        assert!(validate_file_name("REPORT.CSV").is_ok());
        assert!(validate_file_name("dir/sub/data.csv").is_ok());
        assert!(matches!(validate_file_name("data.xlsx"), Err(UploadError::InvalidFileType(_))));
        assert!(validate_file_name(".csv").is_err());
        assert!(validate_file_name("csv").is_err());
    }

    #[test]
    fn directory_parts_are_stripped() {
        assert_eq!(base_file_name("../../etc/data.csv"), "data.csv");
        assert_eq!(base_file_name(r"C:\Users\me\data.csv"), "data.csv");
        assert_eq!(base_file_name("plain.csv"), "plain.csv");
    }
}
