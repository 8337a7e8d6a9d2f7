use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::error::record_server_errors;
use super::handlers::{analysis, health, uploads};
use crate::services::AppServices;

#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
}

pub async fn create_app(services: AppServices, cors_origin: Option<&str>) -> Result<Router> {
    let state = AppState { services };

    let cors = match cors_origin {
        Some(origin) if origin != "*" => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn_with_state(state.clone(), record_server_errors)),
        )
        .with_state(state);

    Ok(app)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Uploads are streamed and size-checked by the upload pipeline itself
        .route(
            "/uploads",
            post(uploads::upload_csv).layer(DefaultBodyLimit::disable()),
        )
        .route("/analysis/start", post(analysis::start_analysis))
        .route("/analysis/status/:session_id", get(analysis::analysis_status))
        .route("/analysis/results/:session_id", get(analysis::analysis_results))
}
