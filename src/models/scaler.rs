//! Standard scaling with statistics fixed at training time

use crate::error::InferenceError;
use serde::{Deserialize, Serialize};

/// Z-score scaler: `(x - mean) / scale`, one pair of statistics per feature.
///
/// Stored as `{"mean": [...], "scale": [...]}`, the fitted attributes of the
/// training-side scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Create a scaler, rejecting mismatched or non-finite statistics
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, String> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Scaler that leaves `width` features untouched
    pub fn identity(width: usize) -> Self {
        Self {
            mean: vec![0.0; width],
            scale: vec![1.0; width],
        }
    }

    /// Check the invariants serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.is_empty() {
            return Err("scaler has no features".to_string());
        }
        if let Some(i) = self
            .mean
            .iter()
            .chain(&self.scale)
            .position(|v| !v.is_finite())
        {
            return Err(format!("non-finite statistic at position {i}"));
        }
        Ok(())
    }

    /// Number of features the scaler was fitted on
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Scale one feature vector
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f32>, InferenceError> {
        if features.len() != self.width() {
            return Err(InferenceError::ScalerShape {
                expected: self.width(),
                actual: features.len(),
            });
        }

        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&mean, &scale))| {
                // Constant features were fitted with zero variance
                let scale = if scale == 0.0 { 1.0 } else { scale };
                ((x - mean) / scale) as f32
            })
            .collect())
    }
}
