use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coursellm_core::{FallbackController, ProxyConfig, SharedLogger, TracingLogger};
use coursellm_proxy::{router, AppState};

#[derive(Parser, Debug)]
#[command(name = "coursellm-proxy", version, about = "Chat-completion proxy for the course app")]
struct Args {
    /// YAML config file (defaults to the platform config dir)
    #[arg(long, env = "COURSELLM_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8787
    #[arg(long)]
    listen: Option<String>,

    /// Fall back to the local companion when the cloud provider fails
    #[arg(long)]
    local_fallback: bool,

    /// Base URL of the local companion
    #[arg(long)]
    local_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config =
        ProxyConfig::resolve(args.config.as_deref()).context("failed to load proxy config")?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(url) = args.local_url {
        config.local_fallback.url = url;
        config.local_fallback.enabled = true;
    }
    if args.local_fallback {
        config.local_fallback.enabled = true;
    }
    config.validate()?;

    let client = reqwest::Client::builder()
        .connect_timeout(config.cloud.connect_timeout())
        .build()
        .context("failed to build HTTP client")?;

    let logger: SharedLogger = Arc::new(TracingLogger::new());
    let controller = FallbackController::from_config(&config, client, logger);
    info!(
        providers = ?controller
            .providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect::<Vec<_>>(),
        model = %config.cloud.default_model,
        "provider chain ready"
    );

    let app = router(AppState::new(controller));
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!("listening on http://{}", config.listen);

    axum::serve(listener, app).await?;
    Ok(())
}
