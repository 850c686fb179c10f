use crate::{
    error::{DesignError, Result},
    gemini::{
        api_error, endpoint, require_key, GenerateContentRequest, GenerateContentResponse,
        GenerationConfig, Part,
    },
    models::{EncodedImage, SynthesisRequest},
    services::ImageSynthesizer,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    base_url: String,
    model: String,
}

impl ImageClient {
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

    fn build_request(request: &SynthesisRequest) -> GenerateContentRequest {
        let mut parts: Vec<Part> = request.images.iter().map(Part::image).collect();
        parts.push(Part::text(request.prompt.clone()));

        GenerateContentRequest::new(
            parts,
            GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
                ..Default::default()
            },
        )
    }

    /// Streams the response and returns as soon as a chunk carries image data.
    pub async fn generate(&self, api_key: &str, request: &SynthesisRequest) -> Result<EncodedImage> {
        require_key(api_key)?;

        let body = Self::build_request(request);
        let url = format!(
            "{}?alt=sse",
            endpoint(&self.base_url, &self.model, "streamGenerateContent")
        );

        log::info!(
            "Generating image with model: {} ({} reference images)",
            self.model,
            request.images.len()
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::error!("Image generation failed with status {}", status);
            return Err(api_error(status.as_u16(), &text));
        }

        let mut scanner = SseImageScanner::default();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(image) = scanner.push(&chunk)? {
                log::info!(
                    "Received {} ({} bytes) after {} events",
                    image.mime_type,
                    image.len(),
                    scanner.events
                );
                return Ok(image);
            }
        }

        let events = scanner.events;
        match scanner.finish()? {
            Some(image) => Ok(image),
            None => {
                log::warn!("Stream ended after {} events without image data", events);
                Err(DesignError::GenerationEmpty)
            }
        }
    }
}

/// Incremental reader for `alt=sse` responses; yields the first inline image.
#[derive(Debug, Default)]
struct SseImageScanner {
    buffer: Vec<u8>,
    events: usize,
}

impl SseImageScanner {
    fn push(&mut self, bytes: &[u8]) -> Result<Option<EncodedImage>> {
        self.buffer.extend_from_slice(bytes);

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(image) = self.scan_line(&line)? {
                return Ok(Some(image));
            }
        }
        Ok(None)
    }

    fn finish(mut self) -> Result<Option<EncodedImage>> {
        let rest = std::mem::take(&mut self.buffer);
        self.scan_line(&rest)
    }

    fn scan_line(&mut self, line: &[u8]) -> Result<Option<EncodedImage>> {
        let line = String::from_utf8_lossy(line);
        let payload = match line.trim().strip_prefix("data:") {
            Some(payload) => payload.trim(),
            None => return Ok(None),
        };
        if payload.is_empty() {
            return Ok(None);
        }

        self.events += 1;
        let chunk: GenerateContentResponse = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!("Skipping unreadable stream event: {}", e);
                return Ok(None);
            }
        };

        if let Some(reason) = chunk.block_reason() {
            log::warn!("Prompt blocked by the model: {}", reason);
        }
        chunk.first_image()
    }
}

#[async_trait]
impl ImageSynthesizer for ImageClient {
    async fn synthesize(&self, api_key: &str, request: &SynthesisRequest) -> Result<EncodedImage> {
        self.generate(api_key, request).await
    }
}
