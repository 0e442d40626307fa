//! Feature extraction for student status model inference.
//!
//! Projects a raw request record onto the ordered feature list saved at
//! training time, producing the positional vector the scaler and classifier
//! were fitted on.

use crate::error::ValidationError;
use crate::types::record::{Coerced, RawRecord};
use serde::{Deserialize, Serialize};

/// Ordered feature names; position `i` feeds input `i` of the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

impl FeatureSchema {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Feature extractor that turns raw records into model input vectors.
///
/// Values are read in schema order; extra keys in the record are ignored.
pub struct FeatureExtractor<'a> {
    schema: &'a FeatureSchema,
}

impl<'a> FeatureExtractor<'a> {
    /// Create a new feature extractor over a loaded schema.
    pub fn new(schema: &'a FeatureSchema) -> Self {
        Self { schema }
    }

    /// Extract features from a record.
    ///
    /// Stops at the first feature that is absent or not numeric and names it
    /// in the error.
    pub fn extract(&self, record: &RawRecord) -> Result<Vec<f64>, ValidationError> {
        let mut features = Vec::with_capacity(self.schema.len());

        for name in self.schema.names() {
            match record.coerce(name) {
                Coerced::Number(value) => features.push(value),
                Coerced::Missing => return Err(ValidationError::MissingFeature(name.clone())),
                Coerced::Invalid => return Err(ValidationError::InvalidValue(name.clone())),
            }
        }

        Ok(features)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.schema.len()
    }

    /// Get feature names in model order.
    pub fn feature_names(&self) -> &[String] {
        self.schema.names()
    }
}
