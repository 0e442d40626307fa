//! Local artifact files and the immutable snapshot loaded from them

use crate::artifacts::ArtifactKind;
use crate::config::ArtifactsConfig;
use crate::error::ArtifactLoadError;
use crate::feature_extractor::FeatureSchema;
use crate::models::{Classifier, ClassifierLoader, LabelEncoder, StandardScaler};
use serde::de::DeserializeOwned;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Every artifact, loaded and frozen for the lifetime of the process
pub struct ArtifactSet {
    classifier: Arc<dyn Classifier>,
    scaler: StandardScaler,
    label_encoder: LabelEncoder,
    feature_schema: FeatureSchema,
}

/// Borrowed view of one artifact, looked up by kind
pub enum Artifact<'a> {
    Classifier(&'a dyn Classifier),
    Scaler(&'a StandardScaler),
    LabelEncoder(&'a LabelEncoder),
    FeatureSchema(&'a FeatureSchema),
}

impl Artifact<'_> {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Classifier(_) => ArtifactKind::Classifier,
            Artifact::Scaler(_) => ArtifactKind::Scaler,
            Artifact::LabelEncoder(_) => ArtifactKind::LabelEncoder,
            Artifact::FeatureSchema(_) => ArtifactKind::FeatureSchema,
        }
    }

    /// One-line description for health reports
    pub fn summary(&self) -> String {
        match self {
            Artifact::Classifier(c) => format!("model {}", c.name()),
            Artifact::Scaler(s) => format!("{} scaled features", s.width()),
            Artifact::LabelEncoder(e) => format!("{} classes", e.len()),
            Artifact::FeatureSchema(s) => format!("{} features", s.len()),
        }
    }
}

impl ArtifactSet {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        scaler: StandardScaler,
        label_encoder: LabelEncoder,
        feature_schema: FeatureSchema,
    ) -> Self {
        Self {
            classifier,
            scaler,
            label_encoder,
            feature_schema,
        }
    }

    pub fn get(&self, kind: ArtifactKind) -> Artifact<'_> {
        match kind {
            ArtifactKind::Classifier => Artifact::Classifier(self.classifier.as_ref()),
            ArtifactKind::Scaler => Artifact::Scaler(&self.scaler),
            ArtifactKind::LabelEncoder => Artifact::LabelEncoder(&self.label_encoder),
            ArtifactKind::FeatureSchema => Artifact::FeatureSchema(&self.feature_schema),
        }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn label_encoder(&self) -> &LabelEncoder {
        &self.label_encoder
    }

    pub fn feature_schema(&self) -> &FeatureSchema {
        &self.feature_schema
    }
}

impl fmt::Debug for ArtifactSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSet")
            .field("classifier", &self.classifier.name())
            .field("scaler", &self.scaler)
            .field("label_encoder", &self.label_encoder)
            .field("feature_schema", &self.feature_schema)
            .finish()
    }
}

/// Where the bundle lives on disk and how to decode it
#[derive(Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    model_file: String,
    scaler_file: String,
    label_encoder_file: String,
    feature_columns_file: String,
    loader: Arc<dyn ClassifierLoader>,
}

impl ArtifactStore {
    pub fn new(config: &ArtifactsConfig, loader: Arc<dyn ClassifierLoader>) -> Self {
        Self {
            dir: config.dir(),
            model_file: config.model_file.clone(),
            scaler_file: config.scaler_file.clone(),
            label_encoder_file: config.label_encoder_file.clone(),
            feature_columns_file: config.feature_columns_file.clone(),
            loader,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, kind: ArtifactKind) -> PathBuf {
        let file = match kind {
            ArtifactKind::Classifier => &self.model_file,
            ArtifactKind::Scaler => &self.scaler_file,
            ArtifactKind::LabelEncoder => &self.label_encoder_file,
            ArtifactKind::FeatureSchema => &self.feature_columns_file,
        };
        self.dir.join(file)
    }

    /// The artifact fetched from the remote source
    pub fn primary_path(&self) -> PathBuf {
        self.path_of(ArtifactKind::Classifier)
    }

    /// Load all four artifacts into a fresh snapshot
    pub fn load_all(&self) -> Result<ArtifactSet, ArtifactLoadError> {
        let classifier_path = self.primary_path();
        if !classifier_path.is_file() {
            return Err(ArtifactLoadError::Missing {
                kind: ArtifactKind::Classifier,
                path: classifier_path,
            });
        }
        let classifier = self.loader.load(&classifier_path)?;

        let scaler: StandardScaler = self.load_json(ArtifactKind::Scaler)?;
        scaler
            .validate()
            .map_err(|reason| self.corrupt(ArtifactKind::Scaler, reason))?;

        let label_encoder: LabelEncoder = self.load_json(ArtifactKind::LabelEncoder)?;
        label_encoder
            .validate()
            .map_err(|reason| self.corrupt(ArtifactKind::LabelEncoder, reason))?;

        let feature_schema: FeatureSchema = self.load_json(ArtifactKind::FeatureSchema)?;
        if feature_schema.is_empty() {
            return Err(self.corrupt(ArtifactKind::FeatureSchema, "feature list is empty".into()));
        }

        info!(
            dir = %self.dir.display(),
            model = %classifier.name(),
            features = feature_schema.len(),
            classes = label_encoder.len(),
            "Model artifacts loaded"
        );

        Ok(ArtifactSet::new(
            classifier,
            scaler,
            label_encoder,
            feature_schema,
        ))
    }

    fn load_json<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<T, ArtifactLoadError> {
        let path = self.path_of(kind);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ArtifactLoadError::Missing { kind, path })
            }
            Err(source) => return Err(ArtifactLoadError::Io { kind, path, source }),
        };

        serde_json::from_slice(&bytes).map_err(|e| self.corrupt(kind, e.to_string()))
    }

    fn corrupt(&self, kind: ArtifactKind, reason: String) -> ArtifactLoadError {
        ArtifactLoadError::Corrupt {
            kind,
            path: self.path_of(kind),
            reason,
        }
    }

    /// Sorted file names in the artifact directory
    pub fn listing(&self) -> std::io::Result<Vec<String>> {
        list_dir(&self.dir)
    }
}

/// Sorted file names of a directory
pub fn list_dir(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}
