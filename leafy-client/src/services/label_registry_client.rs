//! Trained label registry client

use crate::error::TransportError;
use crate::models::LabelEntry;
use crate::transport::{Endpoint, RequestBody, Transport};
use leafy_common::api::{endpoints, LabelsResponse};
use reqwest::Method;
use std::collections::BTreeSet;
use tracing::info;

/// Lists and deletes trained species labels
#[derive(Debug, Clone)]
pub struct LabelRegistryClient {
    transport: Transport,
}

impl LabelRegistryClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Fetch the set of trained labels (duplicates collapse by name)
    pub async fn list_labels(&self) -> Result<BTreeSet<LabelEntry>, TransportError> {
        let response: LabelsResponse = self
            .transport
            .request_as(endpoints::TRAIN_LABELS, Method::GET, RequestBody::Empty)
            .await?;

        Ok(response.labels.into_iter().map(LabelEntry::new).collect())
    }

    /// Delete one trained label
    ///
    /// Callers re-fetch with [`list_labels`](Self::list_labels) afterwards;
    /// nothing is removed locally.
    pub async fn delete_label(&self, name: &str) -> Result<(), TransportError> {
        let endpoint = Endpoint::path(endpoints::TRAIN_LABELS).segment(name);
        self.transport
            .request(endpoint, Method::DELETE, RequestBody::Empty)
            .await?;

        info!(label = %name, "Deleted trained label");
        Ok(())
    }
}
