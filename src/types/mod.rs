//! Type definitions for the prediction service

pub mod prediction;
pub mod record;

pub use prediction::{ErrorResponse, PredictionResponse, PredictionResult};
pub use record::RawRecord;
