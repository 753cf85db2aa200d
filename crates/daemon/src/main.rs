//! CFM-ID Wrapper - Main Entry Point
//! HTTP adapter in front of the cfm-predict executable

mod config;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cfmid_api_http::{AppState, HttpServer, RateLimiter};
use cfmid_core::application::constants::SHUTDOWN_DRAIN_TIMEOUT;
use cfmid_core::application::{shutdown_channel, PredictionService};
use cfmid_core::port::id_provider::UuidProvider;
use cfmid_core::port::time_provider::SystemTimeProvider;
use cfmid_core::VERSION;
use cfmid_infra_system::{CfmPredictTool, TempScratchStore};

use config::{LogFormat, WrapperConfig};

fn init_logging(format: &LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("cfmid=info,tower_http=info"))
        .context("Failed to create env filter")?;

    match format {
        LogFormat::Json => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix (container stop)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).context("SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Ctrl+C handler")?,
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.context("Ctrl+C handler")?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (before logging, format is configurable)
    let config = WrapperConfig::from_env().context("Invalid configuration")?;

    // 2. Initialize logging
    init_logging(&config.log_format)?;

    info!("CFM-ID wrapper v{} starting...", VERSION);
    info!(
        executable = %config.tool.executable.display(),
        param_output = %config.tool.param_output.display(),
        param_config = %config.tool.param_config.display(),
        prob_thresh = %config.tool.default_prob_thresh,
        annotate_fragments = config.tool.annotate_fragments,
        timeout_secs = config.tool.timeout.as_secs(),
        output_mode = %config.output_mode,
        max_concurrent = config.max_concurrent,
        "Prediction tool configured"
    );

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let tool = Arc::new(CfmPredictTool::new(time_provider.clone()));
    let scratch_store = Arc::new(TempScratchStore::new(config.scratch_dir.clone()));
    info!(scratch_dir = %scratch_store.dir().display(), "Scratch directory");

    let service = PredictionService::new(
        tool,
        scratch_store,
        Arc::new(UuidProvider),
        time_provider,
        config.tool.clone(),
        config.max_concurrent,
    )
    .with_input_format(config.input_format.clone())
    .with_output_mode(config.output_mode);

    let state = AppState::new(
        Arc::new(service),
        RateLimiter::new(config.rate_limit_burst, config.rate_limit_rate),
    );

    // 4. Start HTTP server
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let server = HttpServer::new(config.http.clone(), state);
    let handle = server
        .start(shutdown_rx)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server start failed: {}", e))?;

    info!(addr = %handle.local_addr, "✅ Ready. POST /predict, GET /healthz");

    // 5. Wait for shutdown signal
    shutdown_signal().await?;

    info!("Shutdown signal received. Draining in-flight requests...");

    // 6. Graceful shutdown
    shutdown_tx.shutdown();
    match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, handle.task).await {
        Ok(Ok(Ok(()))) => info!("Shutdown complete."),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server failed"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task panicked"),
        Err(_) => tracing::warn!("In-flight requests did not drain in time, exiting"),
    }

    Ok(())
}
