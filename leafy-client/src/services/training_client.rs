//! Training command client: start a job and read its status

use crate::error::TransportError;
use crate::transport::{RequestBody, Transport};
use async_trait::async_trait;
use leafy_common::api::{endpoints, StartTrainingRequest, TrainingStatus};
use reqwest::Method;
use tracing::info;

/// Anything the status poller can read training status from
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<TrainingStatus, TransportError>;
}

#[derive(Debug, Clone)]
pub struct TrainingClient {
    transport: Transport,
}

impl TrainingClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Ask the backend to start training `label`
    ///
    /// A rejection with `already_trained` comes back as
    /// `TransportError::RejectedRequest { already_trained: true, .. }`.
    pub async fn start_training(&self, label: &str) -> Result<(), TransportError> {
        let request = StartTrainingRequest {
            leaf_name: label.to_string(),
        };
        let value = serde_json::to_value(&request)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        self.transport
            .request(endpoints::TRAIN_START, Method::POST, RequestBody::Json(value))
            .await?;

        info!(label = %label, "Training start accepted");
        Ok(())
    }

    /// Read the current training status once
    pub async fn status(&self) -> Result<TrainingStatus, TransportError> {
        self.transport
            .request_as(endpoints::TRAIN_STATUS, Method::GET, RequestBody::Empty)
            .await
    }
}

#[async_trait]
impl StatusSource for TrainingClient {
    async fn fetch_status(&self) -> Result<TrainingStatus, TransportError> {
        self.status().await
    }
}
