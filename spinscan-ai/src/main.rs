//! spinscan-ai - Album Identification Microservice
//!
//! **Module Identity:**
//! - Name: spinscan-ai
//! - Default port: 5731
//!
//! Accepts several photos of a vinyl record or CD, reads them with the
//! vision service, matches the fused evidence against the Discogs catalog
//! and returns a classified, explained result.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spinscan_ai::config::{PipelineConfig, ServiceSettings, VISION_ENDPOINT_ENV};
use spinscan_ai::extractors::vision_client::VisionClient;
use spinscan_ai::matching::DiscogsClient;
use spinscan_ai::services::IdentificationService;
use spinscan_ai::workflow::IdentificationPipeline;
use spinscan_ai::AppState;
use spinscan_common::config::{load_toml_config, resolve_config_path, TomlConfig};

/// Command-line arguments for spinscan-ai
#[derive(Parser, Debug)]
#[command(name = "spinscan-ai")]
#[command(about = "Multi-photo album identification service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "SPINSCAN_PORT")]
    port: Option<u16>,

    /// Config file path
    #[arg(short, long, env = "SPINSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Vision service extraction endpoint
    #[arg(long)]
    vision_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load configuration")?,
        None => TomlConfig::default(),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("spinscan_ai={0},spinscan_common={0},tower_http=info", toml_config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting spinscan-ai (Album Identification) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) if path.exists() => info!("Config: {}", path.display()),
        Some(path) => warn!("Config file {} not found, using built-in defaults", path.display()),
        None => warn!("No config directory available, using built-in defaults"),
    }

    let pipeline_config = PipelineConfig::from_toml(&toml_config).context("Invalid pipeline configuration")?;
    let settings = ServiceSettings::resolve(&toml_config, args.vision_endpoint.as_deref());

    let vision_endpoint = settings.vision_endpoint.clone().with_context(|| {
        format!(
            "Vision endpoint not configured. Please configure using one of:\n\
             1. Command line: --vision-endpoint http://host:port/extract\n\
             2. Environment: {}=http://host:port/extract\n\
             3. TOML config: [vision] endpoint = \"http://host:port/extract\"",
            VISION_ENDPOINT_ENV
        )
    })?;

    let vision = VisionClient::new(vision_endpoint, settings.vision_api_key.clone())
        .context("Failed to initialize vision client")?;
    info!("Vision endpoint: {}", vision.endpoint());

    if settings.discogs_token.is_none() {
        warn!("Discogs token not configured; catalog searches will be rejected");
    }
    let discogs = DiscogsClient::new(
        settings.discogs_token.clone(),
        settings.discogs_base_url.clone(),
        settings.discogs_requests_per_second,
    )
    .context("Failed to initialize Discogs client")?;

    let pipeline = IdentificationPipeline::new(Arc::new(vision), Arc::new(discogs), pipeline_config);
    let state = AppState::new(IdentificationService::new(pipeline));
    let app = spinscan_ai::build_router(state);

    let port = args.port.unwrap_or(toml_config.port);
    let addr: SocketAddr = format!("{}:{}", toml_config.bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}", toml_config.bind_address))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
