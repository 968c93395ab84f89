use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use todo_api::auth::TokenCodec;
use todo_api::config::AppConfig;
use todo_api::database::PgStore;
use todo_api::AppState;

#[derive(Parser)]
#[command(name = "todo-api")]
#[command(about = "Todo list REST backend")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, default_value = "dev", help = "Environment to start the app in (prod/staging/dev/test)")]
    env: String,

    #[arg(long, global = true, default_value = "config", help = "Directory holding <env>.yaml files")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the API server")]
    Runserver {
        #[arg(long, help = "Serve address, defaults to 0.0.0.0:<port>")]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL / JWT_SECRET overrides are picked up
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config_dir, &cli.env)
        .with_context(|| format!("failed to load '{}' configuration", cli.env))?;

    let default_filter = if config.dev { "todo_api=debug,tower_http=debug" } else { "todo_api=info,tower_http=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    match cli.command {
        Commands::Runserver { addr } => runserver(config, addr).await,
    }
}

async fn runserver(config: AppConfig, addr: Option<String>) -> anyhow::Result<()> {
    tracing::info!("Starting Todo API in {:?} mode", config.environment);
    if config.is_production() && config.dev {
        tracing::warn!("dev flag is set in a production configuration");
    }

    let store = Arc::new(PgStore::connect(&config.db).await.context("failed to connect to database")?);
    store.migrate().await.context("failed to apply migrations")?;

    let codec = TokenCodec::new(&config.jwt).context("invalid jwt configuration")?;
    let bind_addr = addr.unwrap_or_else(|| format!("0.0.0.0:{}", config.port));

    let state = AppState::new(config, codec, store.clone(), store.clone());
    let app = todo_api::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
