//! Data models for leafy-client

pub mod prediction;
pub mod training_session;

pub use prediction::{format_percent, title_case, PredictionResult, TOP_ALTERNATIVES};
pub use training_session::{
    ImageCount, LabelEntry, StagedFile, StagedUpload, TrainingSession,
};
