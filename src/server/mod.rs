pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;

use anyhow::Result;
use clap::Subcommand;
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::Config;
use crate::database::{connection::*, migrations::Migrator};
use crate::services::{AppServices, Collaborators};

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

pub async fn start_server(port: u16, database_path: &str, cors_origin: Option<&str>, config: Config) -> Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    Migrator::up(&db, None).await?;
    info!("Database migrations completed");

    let collaborators = Collaborators::from_config(&config)?;
    let (services, _worker) = AppServices::start(db, &config, collaborators);
    let app = app::create_app(services, cors_origin).await?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  GET  /health                                - Health check");
    info!("  POST /api/v1/uploads                        - Upload a CSV file (multipart field 'file')");
    info!("  POST /api/v1/analysis/start?session_id=     - Start a deep analysis run");
    info!("  GET  /api/v1/analysis/status/:session_id    - Poll run progress");
    info!("  GET  /api/v1/analysis/results/:session_id   - Full run results");
}

pub async fn migrate_database(database_path: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
