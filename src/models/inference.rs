//! Inference pipeline: validate, scale, classify, decode

use crate::artifacts::ArtifactSet;
use crate::error::{InferenceError, PredictError};
use crate::feature_extractor::FeatureExtractor;
use crate::types::prediction::PredictionResult;
use crate::types::record::RawRecord;
use std::sync::Arc;
use tracing::debug;

/// Runs predictions over an immutable artifact snapshot.
///
/// Cheap to clone and safe to share between request handlers; nothing in
/// here is mutated after construction.
#[derive(Clone)]
pub struct InferencePipeline {
    artifacts: Arc<ArtifactSet>,
}

impl InferencePipeline {
    pub fn new(artifacts: Arc<ArtifactSet>) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Predict the label of one record
    pub fn predict(&self, record: &RawRecord) -> Result<PredictionResult, PredictError> {
        let features = FeatureExtractor::new(self.artifacts.feature_schema()).extract(record)?;

        let scaled = self.artifacts.scaler().transform(&features)?;

        let distribution = self.artifacts.classifier().predict_proba(&scaled)?;

        let labels = self.artifacts.label_encoder().classes();
        if distribution.len() != labels.len() {
            return Err(InferenceError::OutputShape {
                expected: labels.len(),
                actual: distribution.len(),
            }
            .into());
        }
        if let Some(i) = distribution.iter().position(|p| !p.is_finite()) {
            return Err(InferenceError::NonFinite(i).into());
        }

        let result = PredictionResult::from_distribution(labels, &distribution).ok_or(
            InferenceError::OutputShape {
                expected: labels.len(),
                actual: distribution.len(),
            },
        )?;

        debug!(
            prediction = %result.prediction,
            confidence = result.confidence(),
            "Prediction complete"
        );

        Ok(result)
    }
}
