//! Image staging client
//!
//! Stages candidate training images on the backend, either by server-side
//! search (`preview`) or from user files (`upload`). Returned references are
//! server-relative paths; resolve them with `Transport::resolve_image_url`.

use crate::error::TransportError;
use crate::models::{ImageCount, StagedUpload};
use crate::transport::{FormField, RequestBody, Transport};
use leafy_common::api::{endpoints, fields, PreviewRequest, PreviewResponse, UploadResponse};
use reqwest::Method;
use tracing::info;

/// Images accepted by `POST /train/upload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub images: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct ImageStagingClient {
    transport: Transport,
}

impl ImageStagingClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Ask the backend to find up to `max_images` candidates for `label`
    pub async fn preview(
        &self,
        label: &str,
        max_images: ImageCount,
    ) -> Result<Vec<String>, TransportError> {
        let request = PreviewRequest {
            leaf_name: label.to_string(),
            max_images: max_images.get(),
        };
        let value = serde_json::to_value(&request)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        let response: PreviewResponse = self
            .transport
            .request_as(endpoints::TRAIN_PREVIEW, Method::POST, RequestBody::Json(value))
            .await?;

        info!(
            label = %label,
            requested = max_images.get(),
            received = response.images.len(),
            "Preview images staged"
        );
        Ok(response.images)
    }

    /// Upload user files as staged training material for `label`
    ///
    /// The call succeeds or fails as a whole.
    pub async fn upload(
        &self,
        label: &str,
        files: &StagedUpload,
    ) -> Result<UploadResult, TransportError> {
        let mut form = Vec::with_capacity(files.len() + 1);
        form.push(FormField::Text {
            name: fields::LEAF_NAME.to_string(),
            value: label.to_string(),
        });
        form.extend(files.files.iter().map(|file| FormField::File {
            name: fields::UPLOAD_IMAGES.to_string(),
            file_name: file.file_name.clone(),
            bytes: file.bytes.clone(),
        }));

        let response: UploadResponse = self
            .transport
            .request_as(endpoints::TRAIN_UPLOAD, Method::POST, RequestBody::Multipart(form))
            .await?;

        info!(
            label = %label,
            sent = files.len(),
            accepted = response.count,
            "Uploaded training images"
        );
        Ok(UploadResult {
            images: response.images,
            count: response.count,
        })
    }
}
