//! Request metrics and statistics tracking for the prediction service.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for served predictions
pub struct PredictionMetrics {
    /// Successful predictions
    pub predictions_served: AtomicU64,
    /// Requests rejected for missing or invalid features
    pub validation_failures: AtomicU64,
    /// Requests that failed inside the model
    pub inference_failures: AtomicU64,
    /// Predictions by label
    predictions_by_label: RwLock<BTreeMap<String, u64>>,
    /// Rejections by offending feature
    failures_by_feature: RwLock<BTreeMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PredictionMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            predictions_by_label: RwLock::new(BTreeMap::new()),
            failures_by_feature: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, processing_time: Duration, label: &str) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut by_label) = self.predictions_by_label.write() {
            *by_label.entry(label.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a request rejected because of `feature`
    pub fn record_validation_failure(&self, feature: &str) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_feature) = self.failures_by_feature.write() {
            *by_feature.entry(feature.to_string()).or_insert(0) += 1;
        }
    }

    pub fn record_inference_failure(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => {
                let mut sorted = times.clone();
                sorted.sort_unstable();
                sorted
            }
            _ => return ProcessingStats::default(),
        };

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get predictions by label
    pub fn get_predictions_by_label(&self) -> BTreeMap<String, u64> {
        self.predictions_by_label
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Get rejections by feature
    pub fn get_failures_by_feature(&self) -> BTreeMap<String, u64> {
        self.failures_by_feature
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Point-in-time copy for diagnostics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            predictions_served: self.predictions_served.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            predictions_by_label: self.get_predictions_by_label(),
            failures_by_feature: self.get_failures_by_feature(),
            processing: self.get_processing_stats(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let total = snapshot.predictions_served
            + snapshot.validation_failures
            + snapshot.inference_failures;
        let rejection_rate = if total > 0 {
            (snapshot.validation_failures as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let throughput = self.get_throughput();
        let processing = &snapshot.processing;

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║           STUDENT STATUS SERVICE - METRICS SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions Served:     {:>8}  │  Throughput: {:>6.1} req/s ║",
            snapshot.predictions_served, throughput
        );
        info!(
            "║ Rejected Requests:      {:>8}  │  Reject Rate: {:>6.1}%    ║",
            snapshot.validation_failures, rejection_rate
        );
        info!(
            "║ Inference Failures:     {:>8}                                ║",
            snapshot.inference_failures
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predictions by Label:                                        ║");
        for (label, count) in &snapshot.predictions_by_label {
            let pct = if snapshot.predictions_served > 0 {
                (*count as f64 / snapshot.predictions_served as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
            info!("║   {:10}: {:>6} ({:>5.1}%) {}", label, count, pct, bar);
        }
        if !snapshot.failures_by_feature.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Rejections by Feature:                                       ║");
            for (feature, count) in &snapshot.failures_by_feature {
                info!("║   {:24}: {:>6}", feature, count);
            }
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PredictionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable copy of every counter
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub predictions_served: u64,
    pub validation_failures: u64,
    pub inference_failures: u64,
    pub predictions_by_label: BTreeMap<String, u64>,
    pub failures_by_feature: BTreeMap<String, u64>,
    pub processing: ProcessingStats,
    pub uptime_secs: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PredictionMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PredictionMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
