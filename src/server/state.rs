//! Shared state handed to every request handler

use crate::metrics::PredictionMetrics;
use crate::models::InferencePipeline;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

/// Read-only after construction except for the metric counters
pub struct AppState {
    pub pipeline: InferencePipeline,
    pub metrics: Arc<PredictionMetrics>,
    pub artifacts_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        pipeline: InferencePipeline,
        metrics: Arc<PredictionMetrics>,
        artifacts_dir: impl Into<PathBuf>,
        static_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            metrics,
            artifacts_dir: artifacts_dir.into(),
            static_dir,
            started_at: Utc::now(),
        }
    }
}
