//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use student_status_service::artifacts::{ArtifactSource, ArtifactStore};
use student_status_service::config::{ArtifactsConfig, ProvisioningConfig};
use student_status_service::error::{ArtifactLoadError, InferenceError, ProvisioningError};
use student_status_service::models::{Classifier, ClassifierLoader};
use student_status_service::artifacts::ArtifactKind;

pub const LABELS: [&str; 3] = ["Dropout", "Enrolled", "Graduate"];

/// Returns the same distribution for every input
pub struct FixedClassifier {
    pub distribution: Vec<f32>,
}

impl Classifier for FixedClassifier {
    fn name(&self) -> &str {
        "fixed"
    }

    fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        Ok(self.distribution.clone())
    }
}

/// Accepts any model file whose content starts with `MODEL`
pub struct FakeLoader;

impl ClassifierLoader for FakeLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ArtifactLoadError> {
        let bytes = std::fs::read(path).map_err(|source| ArtifactLoadError::Io {
            kind: ArtifactKind::Classifier,
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.starts_with(b"MODEL") {
            Ok(Arc::new(FixedClassifier {
                distribution: vec![0.1, 0.2, 0.7],
            }))
        } else {
            Err(ArtifactLoadError::Corrupt {
                kind: ArtifactKind::Classifier,
                path: path.to_path_buf(),
                reason: "not a model".to_string(),
            })
        }
    }
}

/// Scripted artifact source that counts its downloads.
///
/// Serves `payloads` in order and repeats the last one once exhausted.
pub struct FakeSource {
    payloads: Mutex<Vec<Vec<u8>>>,
    calls: Arc<AtomicU32>,
    delay: Duration,
    fail: bool,
}

impl FakeSource {
    pub fn serving(payloads: &[&[u8]]) -> Self {
        Self {
            payloads: Mutex::new(payloads.iter().map(|p| p.to_vec()).collect()),
            calls: Arc::new(AtomicU32::new(0)),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::serving(&[])
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Share a download counter between several sources
    pub fn with_counter(mut self, calls: Arc<AtomicU32>) -> Self {
        self.calls = calls;
        self
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    fn next_payload(&self) -> Vec<u8> {
        let mut payloads = self.payloads.lock().unwrap();
        if payloads.len() > 1 {
            payloads.remove(0)
        } else {
            payloads.first().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl ArtifactSource for FakeSource {
    async fn fetch(&self, dest: &Path) -> Result<u64, ProvisioningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ProvisioningError::Download {
                url: self.describe(),
                reason: "connection refused".to_string(),
            });
        }
        let payload = self.next_payload();
        tokio::fs::write(dest, &payload).await.unwrap();
        Ok(payload.len() as u64)
    }

    fn describe(&self) -> String {
        "fake://model".to_string()
    }
}

pub fn artifacts_config(dir: &Path) -> ArtifactsConfig {
    ArtifactsConfig {
        dir: dir.to_string_lossy().into_owned(),
        ..ArtifactsConfig::default()
    }
}

pub fn provisioning_config() -> ProvisioningConfig {
    ProvisioningConfig {
        model_url: "http://127.0.0.1:9/model.onnx".to_string(),
        poll_interval_ms: 20,
        wait_timeout_secs: 5,
        ..ProvisioningConfig::default()
    }
}

pub fn store(dir: &Path) -> ArtifactStore {
    ArtifactStore::new(&artifacts_config(dir), Arc::new(FakeLoader))
}

/// Write the three locally shipped artifacts for features `f1` and `f2`
pub fn write_bundle(dir: &Path) {
    std::fs::write(
        dir.join("scaler.json"),
        r#"{"mean": [0.0, 0.0], "scale": [1.0, 1.0]}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("label_encoder.json"),
        serde_json::json!({ "classes": LABELS }).to_string(),
    )
    .unwrap();
    std::fs::write(dir.join("feature_columns.json"), r#"["f1", "f2"]"#).unwrap();
}
