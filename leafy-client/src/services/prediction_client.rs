//! Prediction client
//!
//! Both entry points hit `POST /predict`; only the payload encoding differs.

use crate::error::TransportError;
use crate::models::PredictionResult;
use crate::transport::{FormField, RequestBody, Transport};
use leafy_common::api::{endpoints, fields, PredictResponse, PredictUrlRequest};
use reqwest::Method;
use tracing::info;

/// Classifies leaf images
#[derive(Debug, Clone)]
pub struct PredictionClient {
    transport: Transport,
}

impl PredictionClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Classify raw image bytes (multipart field `file`)
    pub async fn predict_from_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<PredictionResult, TransportError> {
        let body = RequestBody::Multipart(vec![FormField::File {
            name: fields::PREDICT_FILE.to_string(),
            file_name: file_name.to_string(),
            bytes,
        }]);
        self.predict(body).await
    }

    /// Classify an image the backend downloads itself (JSON `{url}`)
    pub async fn predict_from_url(&self, url: &str) -> Result<PredictionResult, TransportError> {
        let request = PredictUrlRequest {
            url: url.to_string(),
        };
        let value = serde_json::to_value(&request)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
        self.predict(RequestBody::Json(value)).await
    }

    async fn predict(&self, body: RequestBody) -> Result<PredictionResult, TransportError> {
        let response: PredictResponse = self
            .transport
            .request_as(endpoints::PREDICT, Method::POST, body)
            .await?;
        let result = PredictionResult::from_response(response)?;

        info!(
            species = %result.species,
            confidence = result.confidence,
            classes = result.all_probabilities.len(),
            "Prediction received"
        );

        Ok(result)
    }
}
