//! Caption suggestions from an external text-generation endpoint.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::CaptionConfig;

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("Caption suggestions are not available.")]
    Disabled,

    #[error("Invalid photo data URI: {0}")]
    InvalidDataUri(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Caption service answered {status}")]
    Upstream { status: u16 },

    #[error("Caption service returned no caption")]
    Empty,
}

/// A `data:<mime>;base64,<payload>` image, checked before it leaves the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoDataUri(String);

impl PhotoDataUri {
    pub fn parse(raw: &str) -> Result<Self, CaptionError> {
        let rest = raw
            .strip_prefix("data:")
            .ok_or_else(|| CaptionError::InvalidDataUri("missing data: prefix".into()))?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| CaptionError::InvalidDataUri("expected base64 encoding".into()))?;
        if !mime.starts_with("image/") {
            return Err(CaptionError::InvalidDataUri(format!(
                "{} is not an image type",
                mime
            )));
        }
        STANDARD
            .decode(payload)
            .map_err(|e| CaptionError::InvalidDataUri(e.to_string()))?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait CaptionSuggester: Send + Sync {
    async fn suggest(&self, photo: &PhotoDataUri) -> Result<String, CaptionError>;
}

/// Build the gateway the config asks for.
pub fn from_config(config: &CaptionConfig) -> Box<dyn CaptionSuggester> {
    match &config.endpoint {
        Some(endpoint) => match HttpCaptionSuggester::new(endpoint, config) {
            Ok(client) => Box::new(client),
            Err(e) => {
                tracing::warn!("Caption client could not be built, suggestions disabled: {}", e);
                Box::new(DisabledCaptions)
            }
        },
        None => Box::new(DisabledCaptions),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestRequest<'a> {
    photo_data_uri: &'a str,
    topic_keywords: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestResponse {
    suggested_caption: Option<String>,
}

pub struct HttpCaptionSuggester {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    keywords: String,
}

impl HttpCaptionSuggester {
    pub fn new(endpoint: &str, config: &CaptionConfig) -> Result<Self, CaptionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: config.api_key.clone(),
            keywords: config.keywords.clone(),
        })
    }
}

#[async_trait]
impl CaptionSuggester for HttpCaptionSuggester {
    async fn suggest(&self, photo: &PhotoDataUri) -> Result<String, CaptionError> {
        let mut request = self.client.post(&self.endpoint).json(&SuggestRequest {
            photo_data_uri: photo.as_str(),
            topic_keywords: &self.keywords,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint = %self.endpoint, status = %status, "Caption request failed");
            return Err(CaptionError::Upstream {
                status: status.as_u16(),
            });
        }

        let body: SuggestResponse = response.json().await?;
        body.suggested_caption
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(CaptionError::Empty)
    }
}

pub struct DisabledCaptions;

#[async_trait]
impl CaptionSuggester for DisabledCaptions {
    async fn suggest(&self, _photo: &PhotoDataUri) -> Result<String, CaptionError> {
        Err(CaptionError::Disabled)
    }
}
