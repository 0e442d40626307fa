//! Student Status Service - Main Entry Point
//!
//! Provisions the model artifacts, then serves predictions over HTTP.

use anyhow::{Context, Result};
use std::sync::Arc;
use student_status_service::{
    artifacts::{ArtifactStore, HttpArtifactSource, Provisioner},
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, PredictionMetrics},
    models::{InferencePipeline, ModelLoader},
    server::{run_server, AppState},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {:?}", config.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Student Status Service");
    info!(
        artifacts_dir = %config.artifacts.dir().display(),
        lock_file = %config.lock_path().display(),
        "Configuration loaded successfully"
    );

    // Provision artifacts before accepting any traffic
    let loader = Arc::new(ModelLoader::with_threads(config.artifacts.onnx_threads));
    let store = ArtifactStore::new(&config.artifacts, loader);
    let source = HttpArtifactSource::new(&config.provisioning)
        .context("Model download source is not configured")?;
    let mut provisioner = Provisioner::new(store, source, &config.provisioning);
    let provisioned = provisioner
        .provision()
        .await
        .context("Failed to provision model artifacts")?;

    let artifacts = Arc::new(provisioned.artifacts);
    info!(
        role = ?provisioned.role,
        features = artifacts.feature_schema().len(),
        labels = ?artifacts.label_encoder().classes(),
        classifier = artifacts.classifier().name(),
        "Inference pipeline initialized"
    );
    let pipeline = InferencePipeline::new(artifacts);

    // Initialize metrics
    let metrics = Arc::new(PredictionMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = Arc::new(AppState::new(
        pipeline,
        metrics.clone(),
        config.artifacts.dir(),
        config.server.static_dir.as_ref().map(std::path::PathBuf::from),
    ));

    run_server(&config.server, state).await?;

    // Print final summary
    metrics.print_summary();
    Ok(())
}
