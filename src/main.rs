use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use smsfin_core::config::{Config, LogFormat};
use smsfin_core::pipeline::SmsPipeline;

fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Load configuration first so the log format can come from it
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    // Initialize structured logging (set RUST_LOG=debug for more output)
    init_logging(&config.logging.format);
    tracing::info!(
        workers = config.pipeline.workers,
        banks = config.banks.len(),
        "Configuration loaded from {}",
        config_path
    );

    // Build the pipeline (rules, extractor, fraud detector, model registry, trainer)
    let pipeline = Arc::new(SmsPipeline::init(&config)?);

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();

    // Spawn the threshold-driven retrain monitor
    if config.training.enabled {
        let trainer = pipeline.trainer().clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            trainer.run_monitor(shutdown).await;
        }));
    }

    // Spawn API server
    if config.api.enabled {
        let api_pipeline = pipeline.clone();
        let host = config.api.host.clone();
        let port = config.api.port;
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = smsfin_core::api::serve(api_pipeline, &host, port, shutdown).await {
                tracing::error!(error = %e, "API server failed");
            }
        }));
    }

    tracing::info!("SMS pipeline running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping background tasks...");
    shutdown.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("SMS pipeline stopped gracefully");
    Ok(())
}
