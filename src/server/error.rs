use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use super::app::AppState;
use crate::errors::{AnalysisError, ErrorKind, UploadError};
use crate::services::error_log::{record_error, NewErrorLog};

/// Error returned by every handler.
///
/// Client errors carry their message. Server errors are logged together with an opaque
/// reference and only the reference reaches the caller.
#[derive(Debug)]
pub enum ApiError {
    Upload(UploadError),
    Analysis(AnalysisError),
    Unauthorized,
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::Upload(err)
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        ApiError::Analysis(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UpstreamUnavailable
        | ErrorKind::UnitFailure
        | ErrorKind::RunFailure
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            ApiError::Upload(err @ UploadError::FileTooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, err.error_code(), err.to_string())
            }
            ApiError::Upload(err) => (status_for(err.kind()), err.error_code(), err.to_string()),
            ApiError::Analysis(err) => (status_for(err.kind()), err.error_code(), err.to_string()),
        }
    }
}

/// Attached to 500 responses so [`record_server_errors`] can persist them.
#[derive(Clone, Debug)]
pub struct ServerFailure {
    pub reference: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            let reference = Uuid::new_v4().to_string();
            error!(reference = %reference, error = %message, "Request failed");
            let body = json!({
                "success": false,
                "error": code,
                "message": "An internal error occurred",
                "reference": reference,
            });
            let mut response = (status, Json(body)).into_response();
            response.extensions_mut().insert(ServerFailure { reference, message });
            return response;
        }

        let body = json!({
            "success": false,
            "error": code,
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

/// Writes an error log row for every response carrying a [`ServerFailure`].
pub async fn record_server_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let location = format!("{} {}", request.method(), request.uri().path());
    let response = next.run(request).await;

    if let Some(failure) = response.extensions().get::<ServerFailure>() {
        let entry = NewErrorLog::new(location, failure.message.clone()).with_reference(failure.reference.clone());
        record_error(state.services.errors.as_ref(), entry).await;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ObjectStoreError;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ApiError::from(UploadError::FileTooLarge { limit: 1 }), StatusCode::PAYLOAD_TOO_LARGE),
            (ApiError::from(UploadError::InvalidFileType("a.txt".into())), StatusCode::BAD_REQUEST),
            (ApiError::from(AnalysisError::SessionNotFound("s".into())), StatusCode::NOT_FOUND),
            (ApiError::from(AnalysisError::QueueClosed), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::from(UploadError::Storage(ObjectStoreError::NotFound("k".into()))),
                StatusCode::NOT_FOUND,
            ),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn server_errors_carry_their_reference_and_message() {
        let response = ApiError::from(AnalysisError::QueueClosed).into_response();
        let failure = response.extensions().get::<ServerFailure>().cloned();
        assert!(failure.is_some_and(|f| !f.reference.is_empty() && !f.message.is_empty()));

        let response = ApiError::from(AnalysisError::SessionNotFound("s".into())).into_response();
        assert!(response.extensions().get::<ServerFailure>().is_none());
    }
}
