//! HTTP transport to the classifier backend
//!
//! Single entry point for every backend call. Sends JSON or multipart bodies,
//! parses JSON replies and classifies failures into [`TransportError`].

use crate::error::TransportError;
use leafy_common::api::ErrorBody;
use leafy_common::config::ClientConfig;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Backend endpoint as a list of path segments
///
/// Segments are percent-encoded individually, so a label containing `/` or
/// spaces stays a single segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    segments: Vec<String>,
}

impl Endpoint {
    /// Endpoint from a slash separated path ("train/status", "/predict")
    pub fn path(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Append one raw (unencoded) path segment
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl From<&str> for Endpoint {
    fn from(path: &str) -> Self {
        Endpoint::path(path)
    }
}

/// One multipart form field
#[derive(Debug, Clone)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// Request body encoding
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<FormField>),
}

impl RequestBody {
    fn kind(&self) -> &'static str {
        match self {
            RequestBody::Empty => "empty",
            RequestBody::Json(_) => "json",
            RequestBody::Multipart(_) => "multipart",
        }
    }
}

/// HTTP transport bound to one backend base URL
#[derive(Debug, Clone)]
pub struct Transport {
    base_url: Url,
    http_client: reqwest::Client,
}

impl Transport {
    /// Build a transport from resolved client configuration
    pub fn new(config: &ClientConfig) -> leafy_common::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "leafy/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| leafy_common::Error::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.backend_url.clone(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an endpoint, keeping any path prefix of the base URL
    pub fn endpoint_url(&self, endpoint: &Endpoint) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(endpoint.segments());
        }
        url
    }

    /// Resolve a server-relative image reference for display
    ///
    /// References that are already absolute http(s) URLs are returned as-is.
    pub fn resolve_image_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return reference.to_string();
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        if reference.starts_with('/') {
            format!("{}{}", base, reference)
        } else {
            format!("{}/{}", base, reference)
        }
    }

    /// Perform one request and return the parsed JSON body
    ///
    /// An empty success body (e.g. `DELETE`) parses as `Value::Null`.
    pub async fn request(
        &self,
        endpoint: impl Into<Endpoint>,
        method: Method,
        body: RequestBody,
    ) -> Result<Value, TransportError> {
        let endpoint = endpoint.into();
        let url = self.endpoint_url(&endpoint);

        debug!(method = %method, url = %url, body = body.kind(), "Sending backend request");

        let mut request = self.http_client.request(method, url.clone());
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart(fields) => request.multipart(build_form(fields)),
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::NetworkUnreachable(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::NetworkUnreachable(e.to_string()))?;

        debug!(url = %url, status = status.as_u16(), bytes = bytes.len(), "Backend response");

        if !status.is_success() {
            return Err(rejection(status.as_u16(), status.canonical_reason(), &bytes));
        }

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }

    /// Perform one request and decode the body into `T`
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        endpoint: impl Into<Endpoint>,
        method: Method,
        body: RequestBody,
    ) -> Result<T, TransportError> {
        let value = self.request(endpoint, method, body).await?;
        serde_json::from_value(value).map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }
}

fn build_form(fields: Vec<FormField>) -> Form {
    fields.into_iter().fold(Form::new(), |form, field| match field {
        FormField::Text { name, value } => form.text(name, value),
        FormField::File {
            name,
            file_name,
            bytes,
        } => form.part(name, Part::bytes(bytes).file_name(file_name)),
    })
}

/// Map a non-success reply to `RejectedRequest`, keeping the server's message
fn rejection(status: u16, reason: Option<&str>, body: &[u8]) -> TransportError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(error_body) => TransportError::RejectedRequest {
            status,
            message: error_body.error,
            already_trained: error_body.already_trained.unwrap_or(false),
        },
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            let message = if text.is_empty() {
                reason.unwrap_or("Request failed").to_string()
            } else {
                text
            };
            TransportError::RejectedRequest {
                status,
                message,
                already_trained: false,
            }
        }
    }
}
