//! Wire types for the classifier backend endpoints

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Endpoint paths, relative to the backend base URL
pub mod endpoints {
    pub const PREDICT: &str = "predict";
    pub const TRAIN_STATUS: &str = "train/status";
    pub const TRAIN_START: &str = "train/start";
    pub const TRAIN_LABELS: &str = "train/labels";
    pub const TRAIN_PREVIEW: &str = "train/preview";
    pub const TRAIN_UPLOAD: &str = "train/upload";
}

/// Multipart field names
pub mod fields {
    pub const PREDICT_FILE: &str = "file";
    pub const LEAF_NAME: &str = "leaf_name";
    pub const UPLOAD_IMAGES: &str = "images";
}

/// Error body returned with any non-200 response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// Only sent by `POST /train/start` when the label already exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub already_trained: Option<bool>,
}

/// `POST /predict` JSON body (URL variant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictUrlRequest {
    pub url: String,
}

/// `POST /predict` 200 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub class: String,
    pub confidence: f64,
    #[serde(default)]
    pub all_probs: HashMap<String, f64>,
}

/// Training status as reported by `GET /train/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Idle,
    Starting,
    Downloading,
    Preparing,
    Training,
    Finalizing,
    Completed,
    Error,
}

impl RemoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::Idle => "idle",
            RemoteStatus::Starting => "starting",
            RemoteStatus::Downloading => "downloading",
            RemoteStatus::Preparing => "preparing",
            RemoteStatus::Training => "training",
            RemoteStatus::Finalizing => "finalizing",
            RemoteStatus::Completed => "completed",
            RemoteStatus::Error => "error",
        }
    }
}

/// `GET /train/status` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStatus {
    pub status: RemoteStatus,
    #[serde(default)]
    pub message: String,
}

/// `POST /train/start` JSON body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTrainingRequest {
    pub leaf_name: String,
}

/// `GET /train/labels` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelsResponse {
    #[serde(default)]
    pub labels: Vec<String>,
}

/// `POST /train/preview` JSON body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub leaf_name: String,
    pub max_images: u32,
}

/// `POST /train/preview` 200 response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub images: Vec<String>,
}

/// `POST /train/upload` 200 response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub images: Vec<String>,
    pub count: usize,
}
