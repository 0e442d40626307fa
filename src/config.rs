//! Configuration management for the student status service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `STUDENT_STATUS__SERVER__PORT=9000`
const ENV_PREFIX: &str = "STUDENT_STATUS";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub provisioning: ProvisioningConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/static`, if any
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            static_dir: Some("static".to_string()),
        }
    }
}

/// Artifact bundle layout on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory shared by every worker process
    pub dir: String,
    /// Primary artifact, the only one fetched remotely
    pub model_file: String,
    pub scaler_file: String,
    pub label_encoder_file: String,
    pub feature_columns_file: String,
    /// Number of threads for ONNX inference
    pub onnx_threads: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: "artifacts".to_string(),
            model_file: "ann_student_status.onnx".to_string(),
            scaler_file: "scaler.json".to_string(),
            label_encoder_file: "label_encoder.json".to_string(),
            feature_columns_file: "feature_columns.json".to_string(),
            onnx_threads: 1,
        }
    }
}

impl ArtifactsConfig {
    pub fn dir(&self) -> PathBuf {
        PathBuf::from(&self.dir)
    }
}

/// Download and cross-process coordination settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Versioned, content-stable location of the primary artifact; must be set
    pub model_url: String,
    /// Lock file name, created inside the artifact directory
    pub lock_file: String,
    pub poll_interval_ms: u64,
    pub wait_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Maximum silence between two chunks of the download
    pub read_timeout_secs: u64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            model_url: String::new(),
            lock_file: "model.lock".to_string(),
            poll_interval_ms: 2000,
            wait_timeout_secs: 600,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
        }
    }
}

impl ProvisioningConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between summaries in the log; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 300,
        }
    }
}

impl AppConfig {
    /// Load configuration from `config/config.toml` (optional) and the environment
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/config").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.apply_port_override(std::env::var("PORT").ok().as_deref())?;
        Ok(app)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Hosting platforms hand the listen port over in `PORT`
    fn apply_port_override(&mut self, port: Option<&str>) -> Result<()> {
        if let Some(port) = port {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {port:?}"))?;
        }
        Ok(())
    }

    pub fn lock_path(&self) -> PathBuf {
        self.artifacts.dir().join(&self.provisioning.lock_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.artifacts.model_file, "ann_student_status.onnx");
        assert_eq!(config.provisioning.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.lock_path(), PathBuf::from("artifacts/model.lock"));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[artifacts]\ndir = \"/srv/models\"\n\n[provisioning]\npoll_interval_ms = 250"
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.artifacts.dir, "/srv/models");
        assert_eq!(config.artifacts.scaler_file, "scaler.json");
        assert_eq!(config.provisioning.poll_interval_ms, 250);
        assert_eq!(config.provisioning.lock_file, "model.lock");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_port_override() {
        let mut config = AppConfig::default();
        config.apply_port_override(Some("8081")).unwrap();
        assert_eq!(config.server.port, 8081);

        assert!(config.apply_port_override(Some("not-a-port")).is_err());
        config.apply_port_override(None).unwrap();
        assert_eq!(config.server.port, 8081);
    }
}
