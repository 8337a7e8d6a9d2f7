use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::server::app::AppState;
use crate::server::auth::Identity;
use crate::server::error::ApiError;
use crate::services::{RunProjection, RunResults};

#[derive(Debug, Deserialize)]
pub struct StartParams {
    pub session_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    pub run_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub message: String,
    pub session_id: String,
    pub run_id: i32,
}

/// Queues a new run and returns without waiting for it.
pub async fn start_analysis(
    State(state): State<AppState>,
    Identity(owner_id): Identity,
    Query(params): Query<StartParams>,
) -> Result<Json<StartResponse>, ApiError> {
    let started = state.services.analysis.start(&owner_id, &params.session_id).await?;
    info!(session_id = %started.session_id, run_id = started.run_id, "Analysis queued");

    Ok(Json(StartResponse {
        message: "Deep analysis started".to_string(),
        session_id: started.session_id,
        run_id: started.run_id,
    }))
}

pub async fn analysis_status(
    State(state): State<AppState>,
    Identity(owner_id): Identity,
    Path(session_id): Path<String>,
    Query(params): Query<RunParams>,
) -> Result<Json<RunProjection>, ApiError> {
    let projection = state
        .services
        .analysis
        .status(&owner_id, &session_id, params.run_id)
        .await?;
    Ok(Json(projection))
}

pub async fn analysis_results(
    State(state): State<AppState>,
    Identity(owner_id): Identity,
    Path(session_id): Path<String>,
    Query(params): Query<RunParams>,
) -> Result<Json<RunResults>, ApiError> {
    let results = state
        .services
        .analysis
        .results(&owner_id, &session_id, params.run_id)
        .await?;
    Ok(Json(results))
}
