//! Backend service clients
//!
//! Each client wraps one group of endpoints on top of the shared [`Transport`].
//!
//! [`Transport`]: crate::transport::Transport

pub mod image_staging_client;
pub mod label_registry_client;
pub mod prediction_client;
pub mod training_client;

pub use image_staging_client::{ImageStagingClient, UploadResult};
pub use label_registry_client::LabelRegistryClient;
pub use prediction_client::PredictionClient;
pub use training_client::{StatusSource, TrainingClient};
