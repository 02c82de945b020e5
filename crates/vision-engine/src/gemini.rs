use std::env;
use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde::{Deserialize, Serialize};
use vision_contracts::history::Citation;
use vision_contracts::models::ModelVariant;
use vision_contracts::options::{AspectRatio, Resolution};

use crate::codec::{self, EncodedImage};
use crate::credentials::KeyStore;
use crate::error::ClientError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const NO_GENERATED_IMAGE_MESSAGE: &str = "No image was generated in the response.";
pub const NO_EDITED_IMAGE_MESSAGE: &str = "No edited image was returned.";

const FALLBACK_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    pub aspect_ratio: AspectRatio,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub image_data: String,
    pub citations: Option<Vec<Citation>>,
}

/// The two calls the studio makes against a generative image endpoint.
pub trait ImageClient {
    fn generate(
        &self,
        prompt: &str,
        model: &ModelVariant,
        options: &GenerateOptions,
    ) -> Result<GeneratedImage, ClientError>;

    /// Returns the edited image as a data URI.
    fn edit(
        &self,
        prompt: &str,
        source: &EncodedImage,
        model: &ModelVariant,
    ) -> Result<String, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    #[serde(rename = "mimeType", alias = "mime_type", default)]
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    pub fn to_data_uri(&self) -> String {
        let mime = if self.mime_type.trim().is_empty() {
            FALLBACK_IMAGE_MIME
        } else {
            self.mime_type.trim()
        };
        format!("data:{mime};base64,{}", self.data)
    }
}

/// One content part. Parts the studio does not use (function calls and the
/// like) land in `Other` instead of failing the whole response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: Blob,
    },
    Text {
        text: String,
    },
    Other(serde_json::Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline_image(&self) -> Option<&Blob> {
        match self {
            Part::InlineData { inline_data } if !inline_data.data.is_empty() => Some(inline_data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub image_config: ImageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub grounding_metadata: Option<GroundingMetadata>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebSource {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl GenerateContentResponse {
    fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// First inline image of the first candidate, in response order.
    pub fn first_inline_image(&self) -> Option<&Blob> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(Part::inline_image)
    }

    /// Web references from search grounding. `None` when the response carries
    /// no grounding chunks at all.
    pub fn citations(&self) -> Option<Vec<Citation>> {
        let chunks = self
            .first_candidate()?
            .grounding_metadata
            .as_ref()?
            .grounding_chunks
            .as_ref()?;
        Some(
            chunks
                .iter()
                .filter_map(|chunk| chunk.web.as_ref())
                .filter_map(|web| {
                    let uri = web.uri.as_deref()?.trim();
                    if uri.is_empty() {
                        return None;
                    }
                    Some(Citation {
                        uri: uri.to_string(),
                        title: web.title.clone().unwrap_or_default(),
                    })
                })
                .collect(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    reason: Option<String>,
}

pub fn build_generate_request(
    prompt: &str,
    model: &ModelVariant,
    options: &GenerateOptions,
) -> GenerateContentRequest {
    let image_size = options
        .resolution
        .filter(|_| model.supports_high_res)
        .map(|tier| tier.as_str().to_string());
    let tools = if model.is_high_capability() {
        vec![Tool {
            google_search: GoogleSearch {},
        }]
    } else {
        Vec::new()
    };
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(prompt)],
        }],
        generation_config: Some(GenerationConfig {
            image_config: ImageConfig {
                aspect_ratio: options.aspect_ratio.as_str().to_string(),
                image_size,
            },
        }),
        tools,
    }
}

pub fn build_edit_request(prompt: &str, source: &EncodedImage) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                Part::InlineData {
                    inline_data: Blob {
                        mime_type: source.mime_type.clone(),
                        data: codec::strip_data_uri_prefix(&source.data_uri).to_string(),
                    },
                },
                Part::text(prompt),
            ],
        }],
        generation_config: None,
        tools: Vec::new(),
    }
}

pub fn extract_generated_image(
    response: &GenerateContentResponse,
) -> Result<GeneratedImage, ClientError> {
    let image = response
        .first_inline_image()
        .ok_or_else(|| ClientError::NoImageProduced(NO_GENERATED_IMAGE_MESSAGE.to_string()))?;
    Ok(GeneratedImage {
        image_data: image.to_data_uri(),
        citations: response.citations(),
    })
}

pub fn extract_edited_image(response: &GenerateContentResponse) -> Result<String, ClientError> {
    response
        .first_inline_image()
        .map(Blob::to_data_uri)
        .ok_or_else(|| ClientError::NoImageProduced(NO_EDITED_IMAGE_MESSAGE.to_string()))
}

/// Blocking client for the Gemini `generateContent` endpoint.
///
/// The API key is resolved from the [`KeyStore`] right before each call, so a
/// key selected mid-session is picked up by the next action.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_base: String,
    http: HttpClient,
    keys: KeyStore,
    timeout: Option<Duration>,
}

impl GeminiClient {
    pub fn new(keys: KeyStore) -> Self {
        Self {
            api_base: env::var("GEMINI_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            http: HttpClient::new(),
            keys,
            timeout: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn send(
        &self,
        model: &ModelVariant,
        payload: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ClientError> {
        let api_key = self.keys.resolve().ok_or(ClientError::MissingCredential)?;
        let endpoint = self.endpoint_for_model(&model.id);
        tracing::debug!(%endpoint, model = %model.id, "sending generateContent request");

        let mut request = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .json(payload);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        // reqwest errors carry the full URL, key included.
        let response = request.send().map_err(|err| {
            anyhow::Error::new(err.without_url()).context(format!("Gemini request failed ({endpoint})"))
        })?;
        parse_response(response)
    }
}

impl ImageClient for GeminiClient {
    fn generate(
        &self,
        prompt: &str,
        model: &ModelVariant,
        options: &GenerateOptions,
    ) -> Result<GeneratedImage, ClientError> {
        let payload = build_generate_request(prompt, model, options);
        let response = self.send(model, &payload)?;
        extract_generated_image(&response)
    }

    fn edit(
        &self,
        prompt: &str,
        source: &EncodedImage,
        model: &ModelVariant,
    ) -> Result<String, ClientError> {
        let payload = build_edit_request(prompt, source);
        let response = self.send(model, &payload)?;
        extract_edited_image(&response)
    }
}

fn parse_response(response: HttpResponse) -> Result<GenerateContentResponse, ClientError> {
    let status = response.status();
    let body = response.text().map_err(|err| {
        anyhow::Error::new(err.without_url()).context("Gemini response body read failed")
    })?;
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }
    let parsed = serde_json::from_str(&body).context("Gemini returned invalid JSON payload")?;
    Ok(parsed)
}

fn api_error(code: u16, body: &str) -> ClientError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => ClientError::Api {
            code,
            status: envelope.error.status,
            reason: envelope
                .error
                .details
                .into_iter()
                .find_map(|detail| detail.reason),
            message: if envelope.error.message.trim().is_empty() {
                format!("Gemini request failed ({code})")
            } else {
                envelope.error.message
            },
        },
        Err(_) => ClientError::Api {
            code,
            status: None,
            reason: None,
            message: format!("Gemini request failed ({code}): {}", truncate_text(body, 512)),
        },
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
