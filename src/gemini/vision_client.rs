use crate::{
    error::{DesignError, Result},
    gemini::{
        api_error, endpoint, require_key, GenerateContentRequest, GenerateContentResponse,
        GenerationConfig, Part,
    },
    models::{AestheticDescription, EncodedImage},
    prompts::ANALYSIS_PROMPT,
    services::TasteAnalyzer,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

#[derive(Clone)]
pub struct VisionClient {
    client: Client,
    base_url: String,
    model: String,
}

impl VisionClient {
    pub fn new(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(image: &EncodedImage) -> GenerateContentRequest {
        GenerateContentRequest::new(
            vec![Part::image(image), Part::text(ANALYSIS_PROMPT)],
            GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(analysis_schema()),
                ..Default::default()
            },
        )
    }

    pub async fn analyze_image(
        &self,
        api_key: &str,
        image: &EncodedImage,
    ) -> Result<AestheticDescription> {
        require_key(api_key)?;

        let body = Self::build_request(image);
        log::info!(
            "Analyzing {} image ({} bytes) with model: {}",
            image.mime_type,
            image.len(),
            self.model
        );

        let response = self
            .client
            .post(endpoint(&self.base_url, &self.model, "generateContent"))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| DesignError::AnalysisParseFailure(e.to_string()))?;
        parse_description(&parsed)
    }
}

fn analysis_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "palette": { "type": "ARRAY", "items": { "type": "STRING" } },
            "materials": { "type": "ARRAY", "items": { "type": "STRING" } },
            "layout": { "type": "STRING" },
            "mood": { "type": "STRING" }
        },
        "required": ["palette", "materials", "layout", "mood"]
    })
}

fn parse_description(response: &GenerateContentResponse) -> Result<AestheticDescription> {
    if let Some(reason) = response.block_reason() {
        return Err(DesignError::AnalysisParseFailure(format!(
            "prompt blocked: {}",
            reason
        )));
    }

    let text = response
        .text()
        .ok_or_else(|| DesignError::AnalysisParseFailure("response has no text".into()))?;

    let description: AestheticDescription = serde_json::from_str(text.trim())
        .map_err(|e| DesignError::AnalysisParseFailure(e.to_string()))?;
    Ok(description.normalized())
}

#[async_trait]
impl TasteAnalyzer for VisionClient {
    async fn analyze(&self, api_key: &str, image: &EncodedImage) -> Result<AestheticDescription> {
        self.analyze_image(api_key, image).await
    }
}
