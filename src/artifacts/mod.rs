//! Model artifact bundle: local store, download source and provisioning
//!
//! The four artifacts are produced together by training and deployed as one
//! bundle. Only the classifier is fetched remotely; the scaler, label encoder
//! and feature list ship next to it.

pub mod lock;
pub mod provisioner;
pub mod source;
pub mod store;

pub use lock::{LockGuard, LockSentinel, ProvisioningLock};
pub use provisioner::{Provisioned, Provisioner, ProvisioningRole, ProvisioningState};
pub use source::{ArtifactSource, HttpArtifactSource};
pub use store::{Artifact, ArtifactSet, ArtifactStore};

use std::fmt;

/// Fixed identity of each artifact in the bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Classifier,
    Scaler,
    LabelEncoder,
    FeatureSchema,
}

impl ArtifactKind {
    /// Load order; the classifier goes first since it is the one that gets re-downloaded
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Classifier,
        ArtifactKind::Scaler,
        ArtifactKind::LabelEncoder,
        ArtifactKind::FeatureSchema,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ArtifactKind::Classifier => "classifier",
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::LabelEncoder => "label_encoder",
            ArtifactKind::FeatureSchema => "feature_schema",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
