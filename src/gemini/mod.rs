pub mod image_client;
pub mod vision_client;

use crate::{
    config::GeminiConfig,
    error::{DesignError, Result},
    models::EncodedImage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub use image_client::ImageClient;
pub use vision_client::VisionClient;

/// Vision analysis and image synthesis over one HTTP connection pool.
#[derive(Clone)]
pub struct GeminiClient {
    vision_client: VisionClient,
    image_client: ImageClient,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("design-irl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            vision_client: VisionClient::new(
                client.clone(),
                &config.base_url,
                &config.analysis_model,
            ),
            image_client: ImageClient::new(client, &config.base_url, &config.image_model),
        })
    }

    pub fn vision(&self) -> &VisionClient {
        &self.vision_client
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }
}

pub(crate) fn endpoint(base_url: &str, model: &str, method: &str) -> String {
    format!("{}/models/{}:{}", base_url.trim_end_matches('/'), model, method)
}

pub(crate) fn require_key(api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(DesignError::CredentialMissing(
            "Gemini API key is required".into(),
        ));
    }
    Ok(())
}

/// Maps a non-success response body to an API error, preferring Gemini's own message.
pub(crate) fn api_error(status: u16, body: &str) -> DesignError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(300).collect());
    DesignError::Api { status, message }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// Request types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    pub fn new(parts: Vec<Part>, generation_config: GenerationConfig) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn image(image: &EncodedImage) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: image.to_base64(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
}

// Response types

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter())
            .into_iter()
            .flatten()
    }

    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// The first inline image of the first candidate, decoded.
    pub fn first_image(&self) -> Result<Option<EncodedImage>> {
        match self.first_parts().find_map(|part| part.inline_data.as_ref()) {
            Some(inline) => {
                EncodedImage::from_base64(&inline.data, inline.mime_type.clone()).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
    }
}
