//! ML model inference components

pub mod inference;
pub mod label_encoder;
pub mod loader;
pub mod scaler;

pub use inference::InferencePipeline;
pub use label_encoder::LabelEncoder;
pub use loader::{ClassifierLoader, ModelLoader, OnnxClassifier};
pub use scaler::StandardScaler;

use crate::error::InferenceError;

/// Opaque classifier: scaled feature vector in, class probabilities out.
///
/// Implementations must be shareable across request handlers; the returned
/// distribution is indexed like the label encoder's classes.
pub trait Classifier: Send + Sync {
    /// Name for logs and diagnostics
    fn name(&self) -> &str;

    /// Probability of every class for a single feature vector
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError>;
}
