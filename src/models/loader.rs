//! ONNX classifier loader

use crate::artifacts::ArtifactKind;
use crate::error::{ArtifactLoadError, InferenceError};
use crate::models::Classifier;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Turns the primary artifact file into a ready classifier.
///
/// Any failure is reported as an [`ArtifactLoadError`] so provisioning can
/// tell a truncated download apart from lock or network trouble.
pub trait ClassifierLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ArtifactLoadError>;
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        // Input tensor shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_vec()))
            .map_err(|e| InferenceError::Classifier(format!("failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::Classifier(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| InferenceError::Classifier(e.to_string()))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::Classifier(format!("model has no output named {}", self.output_name))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Classifier(format!("unexpected output type: {e}")))?;

        let probabilities = first_row(&shape.iter().copied().collect::<Vec<i64>>(), data);
        debug!(model = %self.name, classes = probabilities.len(), "Classifier output extracted");
        Ok(probabilities)
    }
}

/// Probabilities of the single batch row: `[1, n]` or `[n]`
fn first_row(dims: &[i64], data: &[f32]) -> Vec<f32> {
    match dims {
        [_, classes] if *classes > 0 => data.iter().take(*classes as usize).copied().collect(),
        _ => data.to_vec(),
    }
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load the ONNX classifier from file
    pub fn load_model(&self, path: &Path) -> Result<OnnxClassifier, ArtifactLoadError> {
        let corrupt = |reason: String| ArtifactLoadError::Corrupt {
            kind: ArtifactKind::Classifier,
            path: path.to_path_buf(),
            reason,
        };

        info!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()
            .map_err(|e| corrupt(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| corrupt(e.to_string()))?
            .with_intra_threads(self.onnx_threads)
            .map_err(|e| corrupt(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| corrupt(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| corrupt("model declares no inputs".to_string()))?;

        // Prefer an explicit probability head, otherwise the last output
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("softmax"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .ok_or_else(|| corrupt("model declares no outputs".to_string()))?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "classifier".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(OnnxClassifier {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierLoader for ModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ArtifactLoadError> {
        Ok(Arc::new(self.load_model(path)?))
    }
}
