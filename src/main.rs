use anyhow::Result;
use clap::{Parser, Subcommand};
use deep_analysis::config::Config;
use deep_analysis::server::{self, MigrateDirection};
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service and the analysis worker
    Serve {
        #[clap(short, long, default_value = "3000")]
        port: u16,
        #[clap(short, long, default_value = "deep_analysis.db")]
        database: String,
        #[clap(long)]
        cors_origin: Option<String>,
    },
    /// Apply or roll back database migrations
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
        #[clap(short, long, default_value = "deep_analysis.db")]
        database: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Serve {
            port,
            database,
            cors_origin,
        } => {
            let config = Config::from_env();
            info!("Starting server on port {}", port);
            server::start_server(port, &database, cors_origin.as_deref(), config).await?;
        }
        Commands::Migrate { direction, database } => {
            server::migrate_database(&database, direction).await?;
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_deref()
        .unwrap_or("info")
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("handlebars=off,sqlx=warn,{}", log_level)));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
