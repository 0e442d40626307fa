//! Error taxonomy for provisioning and inference

use crate::artifacts::ArtifactKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Client-caused problems with a prediction request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing feature: {0}")]
    MissingFeature(String),

    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

impl ValidationError {
    /// Name of the feature that failed validation
    pub fn feature(&self) -> &str {
        match self {
            ValidationError::MissingFeature(name) | ValidationError::InvalidValue(name) => name,
        }
    }
}

/// An artifact on disk is missing, unreadable, or does not decode.
///
/// Provisioning treats every variant as "corrupt or incomplete file" and
/// answers it with a single re-download.
#[derive(Error, Debug)]
pub enum ArtifactLoadError {
    #[error("{kind} artifact not found at {}", path.display())]
    Missing { kind: ArtifactKind, path: PathBuf },

    #[error("failed to read {kind} artifact at {}: {source}", path.display())]
    Io {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {kind} artifact at {}: {reason}", path.display())]
    Corrupt {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },
}

impl ArtifactLoadError {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactLoadError::Missing { kind, .. }
            | ArtifactLoadError::Io { kind, .. }
            | ArtifactLoadError::Corrupt { kind, .. } => *kind,
        }
    }
}

/// Fatal startup failures. None of these are retried.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("failed to acquire provisioning lock at {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gave up after {waited:?} waiting for provisioning lock at {}", path.display())]
    WaitTimeout { path: PathBuf, waited: Duration },

    #[error("failed to download model artifact from {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("failed to write model artifact to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifacts still unusable after re-download: {0}")]
    Reload(#[source] ArtifactLoadError),
}

/// Failures inside scaling, classification or decoding.
///
/// These mean a loaded artifact broke an invariant; the request fails but
/// the server keeps running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("scaler expects {expected} features, got {actual}")]
    ScalerShape { expected: usize, actual: usize },

    #[error("classifier returned {actual} probabilities for {expected} labels")]
    OutputShape { expected: usize, actual: usize },

    #[error("classifier returned a non-finite probability at index {0}")]
    NonFinite(usize),

    #[error("classifier failed: {0}")]
    Classifier(String),
}

/// Anything `InferencePipeline::predict` can fail with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}
