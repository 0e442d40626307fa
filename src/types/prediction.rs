//! Prediction results and their wire representation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Labeled output of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Label with the highest probability
    pub prediction: String,
    /// Probability per label as a percentage (0 - 100)
    pub probabilities: BTreeMap<String, f64>,
}

impl PredictionResult {
    /// Build a result from a probability distribution aligned with `labels`.
    ///
    /// Ties resolve to the first index attaining the maximum. Returns `None`
    /// when the distribution is empty or its length differs from `labels`.
    pub fn from_distribution<S: AsRef<str>>(labels: &[S], distribution: &[f32]) -> Option<Self> {
        if distribution.is_empty() || distribution.len() != labels.len() {
            return None;
        }

        let best = stable_argmax(distribution)?;
        let probabilities = labels
            .iter()
            .zip(distribution)
            .map(|(label, &p)| (label.as_ref().to_string(), f64::from(p) * 100.0))
            .collect();

        Some(Self {
            prediction: labels[best].as_ref().to_string(),
            probabilities,
        })
    }

    /// Probability percentage of the predicted label
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .get(&self.prediction)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Index of the first maximum
pub fn stable_argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Successful `/predict` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: String,
    pub probabilities: BTreeMap<String, f64>,
    pub success: bool,
}

impl From<PredictionResult> for PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.prediction,
            probabilities: result.probabilities,
            success: true,
        }
    }
}

/// Error response body shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub success: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            success: false,
        }
    }
}
