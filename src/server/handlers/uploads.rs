use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap},
    response::Json,
};
use futures_util::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use tracing::info;

use crate::config::KIB;
use crate::errors::UploadError;
use crate::server::app::AppState;
use crate::server::auth::Identity;
use crate::server::error::ApiError;
use crate::services::upload_service::validate_file_name;
use crate::services::UploadReceipt;

const FILE_FIELD: &str = "file";

/// Allowance for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * KIB;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub receipt: UploadReceipt,
    pub message: String,
    pub success: bool,
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

pub async fn upload_csv(
    State(state): State<AppState>,
    Identity(owner_id): Identity,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let limit = state.services.uploads.max_upload_bytes();
    if declared_length(&headers).is_some_and(|length| length > limit + MULTIPART_OVERHEAD) {
        return Err(UploadError::FileTooLarge { limit }.into());
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::InvalidFormat(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| UploadError::MissingFile("file part has no file name".to_string()))?;
        validate_file_name(&file_name)?;
        info!(owner_id = %owner_id, file_name = %file_name, "Receiving upload");

        // Surfaces as UploadError::Stream, a client error
        let stream = Box::pin(field.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)));
        let receipt = state
            .services
            .uploads
            .upload_csv(&owner_id, &file_name, StreamReader::new(stream))
            .await?;

        return Ok(Json(UploadResponse {
            receipt,
            message: "CSV file uploaded successfully".to_string(),
            success: true,
        }));
    }

    Err(UploadError::MissingFile(format!("multipart field '{}' is required", FILE_FIELD)).into())
}
