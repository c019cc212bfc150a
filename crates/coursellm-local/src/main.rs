use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coursellm_local::{router, AppState, LocalConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = LocalConfig::parse();
    config.validate().map_err(|e| anyhow!(e))?;

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let listen = config.listen_addr();
    let warm_on_start = config.warm_on_start;
    let state = AppState::new(config, client);

    info!(
        engine = %state.engine.base_url(),
        model = %state.models.active(),
        mode = %state.gate.mode(),
        max_concurrent = state.gate.max_concurrent(),
        "local companion configured"
    );

    if warm_on_start {
        let model = state.models.active();
        match state
            .models
            .warm(&state.engine, &model, state.config.warmup_timeout())
            .await
        {
            Ok(_) => info!(model = %model, "model ready"),
            Err(e) => warn!("startup warm-up failed: {}", e),
        }
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;
    info!("listening on http://{}", listen);

    axum::serve(listener, app).await?;
    Ok(())
}
