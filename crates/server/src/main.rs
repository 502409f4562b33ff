mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use printflow_core::{
    load_config, validate_config, Config, JobRegistry, PipelineOrchestrator, ProcessSpawner,
};

use api::create_router;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration. An explicitly named file must exist; the
    // implicit default may be absent, in which case defaults apply.
    let config = match std::env::var("PRINTFLOW_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            info!("Loading configuration from {:?}", path);
            load_config(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))?
        }
        Err(_) => {
            let path = PathBuf::from("config.toml");
            if path.exists() {
                info!("Loading configuration from {:?}", path);
                load_config(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))?
            } else {
                info!("No config file found, using defaults");
                Config::default()
            }
        }
    };

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Worker interpreter: {:?}", config.pipeline.interpreter);
    info!(
        "Worker scripts: {:?}, {:?}, {:?}",
        config.pipeline.image_script, config.pipeline.pdf_script, config.pipeline.catalog_script
    );

    // Surface missing worker credentials at startup rather than when
    // the first run fails.
    for name in &config.pipeline.env_passthrough {
        if std::env::var(name).is_ok() {
            info!("Environment variable {} is set", name);
        } else {
            warn!("Environment variable {} is not set", name);
        }
    }

    // Create the shared job registry
    let registry = JobRegistry::new();
    info!("Job registry initialized");

    // Create the pipeline orchestrator over real worker processes
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        config.pipeline.clone(),
        Arc::new(ProcessSpawner::new()),
    ));
    info!("Pipeline orchestrator initialized");

    // Create app state
    let app_state = Arc::new(AppState::new(config.clone(), registry, orchestrator));

    // Create router
    let app = create_router(app_state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
