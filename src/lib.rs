//! Student Status Service Library
//!
//! Serves a pre-trained student status classifier over HTTP. Model artifacts
//! are provisioned once per deployment directory, coordinated across worker
//! processes through a lock file.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod server;
pub mod types;

pub use artifacts::{ArtifactSet, ArtifactStore, HttpArtifactSource, Provisioner};
pub use config::AppConfig;
pub use error::{ArtifactLoadError, InferenceError, PredictError, ProvisioningError, ValidationError};
pub use feature_extractor::{FeatureExtractor, FeatureSchema};
pub use models::InferencePipeline;
pub use types::{PredictionResponse, PredictionResult, RawRecord};
