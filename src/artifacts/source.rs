//! Remote source of the primary model artifact

use crate::config::ProvisioningConfig;
use crate::error::ProvisioningError;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Something that can materialize the primary artifact at a local path
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Write the artifact to `dest`, returning the number of bytes written.
    ///
    /// Implementations must leave `dest` either absent or complete.
    async fn fetch(&self, dest: &Path) -> Result<u64, ProvisioningError>;

    /// Source location for logging
    fn describe(&self) -> String;
}

/// Streams the artifact over HTTP(S)
pub struct HttpArtifactSource {
    url: String,
    client: reqwest::Client,
}

impl HttpArtifactSource {
    pub fn new(config: &ProvisioningConfig) -> Result<Self, ProvisioningError> {
        let url = config.model_url.trim().to_string();
        let download_error = |reason: String| ProvisioningError::Download {
            url: url.clone(),
            reason,
        };

        if url.is_empty() {
            return Err(download_error(
                "provisioning.model_url is not configured".to_string(),
            ));
        }
        reqwest::Url::parse(&url).map_err(|e| download_error(format!("invalid URL: {e}")))?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()
            .map_err(|e| download_error(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn download_error(&self, reason: impl std::fmt::Display) -> ProvisioningError {
        ProvisioningError::Download {
            url: self.url.clone(),
            reason: reason.to_string(),
        }
    }

    async fn stream_to(&self, part: &Path) -> Result<u64, ProvisioningError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.download_error(e))?;

        if let Some(len) = response.content_length() {
            debug!(url = %self.url, bytes = len, "Download started");
        }

        let write_error = |source: std::io::Error| ProvisioningError::Write {
            path: part.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::create(part).await.map_err(write_error)?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.download_error(e))?;
            if chunk.is_empty() {
                continue;
            }
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(write_error)?;
        file.sync_all().await.map_err(write_error)?;
        Ok(written)
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch(&self, dest: &Path) -> Result<u64, ProvisioningError> {
        info!(url = %self.url, dest = %dest.display(), "Downloading model");

        let part = part_path(dest);
        let written = match self.stream_to(&part).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %part.display(), error = %cleanup, "Failed to remove partial download");
                    }
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|source| ProvisioningError::Write {
                path: dest.to_path_buf(),
                source,
            })?;

        info!(bytes = written, "Download complete");
        Ok(written)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Unique sibling path a download streams into before being renamed
pub fn part_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!("{name}.{}.part", uuid::Uuid::new_v4()))
}

/// Whether `file_name` is a leftover partial download of `dest`
pub fn is_part_of(dest: &Path, file_name: &str) -> bool {
    match dest.file_name().and_then(|n| n.to_str()) {
        Some(name) => file_name
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|rest| rest.ends_with(".part")),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path_is_sibling_and_unique() {
        let dest = Path::new("/srv/models/model.onnx");
        let a = part_path(dest);
        let b = part_path(dest);

        assert_ne!(a, b);
        assert_eq!(a.parent(), dest.parent());
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(is_part_of(dest, name));
    }

    #[test]
    fn test_is_part_of() {
        let dest = Path::new("model.onnx");
        assert!(is_part_of(dest, "model.onnx.1234.part"));
        assert!(!is_part_of(dest, "model.onnx"));
        assert!(!is_part_of(dest, "other.onnx.1234.part"));
        assert!(!is_part_of(dest, "model.onnx.lock"));
    }

    #[test]
    fn test_requires_url() {
        let config = ProvisioningConfig::default();
        assert!(matches!(
            HttpArtifactSource::new(&config),
            Err(ProvisioningError::Download { .. })
        ));

        let config = ProvisioningConfig {
            model_url: "not a url".to_string(),
            ..ProvisioningConfig::default()
        };
        assert!(HttpArtifactSource::new(&config).is_err());
    }
}
