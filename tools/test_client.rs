//! Test Prediction Client
//!
//! Generates random student records and posts them to a running service.

use anyhow::Context;
use rand::Rng;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_FEATURES: &str = "artifacts/feature_columns.json";

/// Record generator for testing
struct RecordGenerator {
    rng: rand::rngs::ThreadRng,
    features: Vec<String>,
}

impl RecordGenerator {
    fn new(features: Vec<String>) -> Self {
        Self {
            rng: rand::thread_rng(),
            features,
        }
    }

    /// Every feature present with a plausible numeric value
    fn generate_complete(&mut self) -> Map<String, Value> {
        let mut record = Map::new();
        for name in &self.features.clone() {
            let value = self.random_value(name);
            record.insert(name.clone(), value);
        }
        record
    }

    /// One feature dropped or garbled, to exercise validation
    fn generate_defective(&mut self) -> Map<String, Value> {
        let mut record = self.generate_complete();
        if self.features.is_empty() {
            return record;
        }
        let victim = self.features[self.rng.gen_range(0..self.features.len())].clone();
        if self.rng.gen_bool(0.5) {
            record.remove(&victim);
        } else {
            record.insert(victim, Value::from("not-a-number"));
        }
        record
    }

    fn random_value(&mut self, name: &str) -> Value {
        let lower = name.to_ascii_lowercase();
        if lower.contains("grade") {
            Value::from((self.rng.gen_range(0.0..200.0_f64) * 10.0).round() / 10.0)
        } else if lower.contains("age") {
            Value::from(self.rng.gen_range(17..60))
        } else if lower.contains("rate") || lower.contains("gdp") {
            Value::from((self.rng.gen_range(-5.0..20.0_f64) * 100.0).round() / 100.0)
        } else if self.rng.gen_bool(0.2) {
            // Clients commonly send numbers as strings
            Value::from(self.rng.gen_range(0..10).to_string())
        } else {
            Value::from(self.rng.gen_range(0..10))
        }
    }
}

fn read_features(path: &str) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feature list from {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid feature list in {path}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Prediction Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .map(|s| s.trim_end_matches('/'))
        .unwrap_or("http://localhost:5000");
    let features_path = args.get(2).map(|s| s.as_str()).unwrap_or(DEFAULT_FEATURES);
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let defect_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    let features = read_features(features_path)?;
    info!(
        base_url = %base_url,
        features = features.len(),
        count = count,
        defect_rate = defect_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    // Check the service is up
    match client.get(format!("{base_url}/health")).send().await {
        Ok(resp) if resp.status().is_success() => info!("Service is ready"),
        Ok(resp) => {
            warn!(status = %resp.status(), "Service not ready. Running in dry-run mode.");
            return run_dry_mode(features, count, defect_rate, delay_ms).await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to reach service. Running in dry-run mode.");
            return run_dry_mode(features, count, defect_rate, delay_ms).await;
        }
    }

    let mut generator = RecordGenerator::new(features);
    let mut rng = rand::thread_rng();
    let predict_url = format!("{base_url}/predict");

    info!("Starting to post {} records...", count);

    let mut served = 0;
    let mut rejected = 0;
    let mut failed = 0;

    for i in 0..count {
        let record = if rng.gen_bool(defect_rate) {
            generator.generate_defective()
        } else {
            generator.generate_complete()
        };

        let resp = client.post(&predict_url).json(&record).send().await?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            served += 1;
        } else if status.is_client_error() {
            rejected += 1;
            info!(error = %body["error"], "Request rejected");
        } else {
            failed += 1;
            warn!(status = %status, body = %body, "Prediction failed");
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Posted {}/{} records ({} served, {} rejected, {} failed)",
                i + 1,
                count,
                served,
                rejected,
                failed
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Posted {} records ({} served, {} rejected, {} failed)",
        count, served, rejected, failed
    );

    Ok(())
}

async fn run_dry_mode(
    features: Vec<String>,
    count: u64,
    defect_rate: f64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no service connection)");

    let mut generator = RecordGenerator::new(features);
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let record = if rng.gen_bool(defect_rate) {
            generator.generate_defective()
        } else {
            generator.generate_complete()
        };

        let json = serde_json::to_string_pretty(&record)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample record {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
