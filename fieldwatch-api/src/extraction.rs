//! Vision extraction client for scanned Form 34A images
//!
//! The extraction service reads the serial number and per-candidate vote
//! counts off a form image. Any failure to produce a usable serial number is
//! reported as `Error::ExtractionFailed` so the upload can be retried with a
//! clearer image.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fieldwatch_common::config::VisionConfig;
use fieldwatch_common::db::CandidateVotes;
use fieldwatch_common::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Serial number and vote counts read from one form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedForm {
    pub serial_number: String,
    pub candidates: Vec<CandidateVotes>,
}

/// Reads a scanned form image
#[async_trait]
pub trait FormExtractor: Send + Sync {
    async fn extract(&self, image: &[u8]) -> Result<ExtractedForm>;

    /// Whether the extractor can be called at all
    fn is_available(&self) -> bool {
        true
    }
}

/// Response body of the extraction service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionResponse {
    #[serde(default)]
    serial_number: Option<String>,
    #[serde(default)]
    candidates: Vec<VisionCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionCandidate {
    first_name: String,
    last_name: String,
    party_name: String,
    votes: i64,
}

/// Parse and check an extraction service response body
pub fn parse_vision_response(body: &str) -> Result<ExtractedForm> {
    let response: VisionResponse = serde_json::from_str(body)
        .map_err(|e| Error::ExtractionFailed(format!("Unreadable extraction response: {}", e)))?;

    let serial_number = response
        .serial_number
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::ExtractionFailed("No serial number found on the form".to_string())
        })?;

    let mut candidates = Vec::with_capacity(response.candidates.len());
    for c in response.candidates {
        if c.votes < 0 {
            return Err(Error::ExtractionFailed(format!(
                "Negative vote count read for {} {}",
                c.first_name, c.last_name
            )));
        }
        candidates.push(CandidateVotes {
            first_name: c.first_name,
            last_name: c.last_name,
            party_name: c.party_name,
            votes: c.votes,
        });
    }

    Ok(ExtractedForm {
        serial_number,
        candidates,
    })
}

/// HTTP client for the external extraction service
pub struct HttpFormExtractor {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpFormExtractor {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl FormExtractor for HttpFormExtractor {
    async fn extract(&self, image: &[u8]) -> Result<ExtractedForm> {
        debug!(endpoint = %self.endpoint, bytes = image.len(), "Sending form image for extraction");

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({ "image_base64": STANDARD.encode(image) }));

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            Error::ExtractionFailed(format!("Extraction service unreachable: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Extraction service returned an error");
            return Err(Error::ExtractionFailed(format!(
                "Extraction service error {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let body = response.text().await.map_err(|e| {
            Error::ExtractionFailed(format!("Failed to read extraction response: {}", e))
        })?;

        parse_vision_response(&body)
    }
}

/// Stand-in used when no extraction endpoint is configured
pub struct DisabledExtractor;

#[async_trait]
impl FormExtractor for DisabledExtractor {
    async fn extract(&self, _image: &[u8]) -> Result<ExtractedForm> {
        Err(Error::ExtractionFailed(
            "No vision extraction endpoint configured".to_string(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Build the extractor described by the `[vision]` config table
pub fn extractor_from_config(config: &VisionConfig) -> Result<Arc<dyn FormExtractor>> {
    match config.endpoint.as_deref().filter(|e| !e.is_empty()) {
        Some(endpoint) => Ok(Arc::new(HttpFormExtractor::new(
            endpoint,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Arc::new(DisabledExtractor)),
    }
}
