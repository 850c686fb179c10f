use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{DesignError, Result};

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Image bytes together with their media type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl EncodedImage {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn from_base64(encoded: &str, mime_type: impl Into<String>) -> Result<Self> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| DesignError::Decode(e.to_string()))?;
        Ok(Self::new(data, mime_type))
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Parses `data:<mime>;base64,<payload>`, as produced by browsers' file readers.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| DesignError::Decode("not a data URL".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| DesignError::Decode("data URL has no payload".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| DesignError::Decode("only base64 data URLs are supported".into()))?;
        let mime_type = if mime_type.is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            mime_type
        };
        Self::from_base64(payload, mime_type)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "jpeg",
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), &self.data)?;
        log::info!(
            "Saved {} ({} bytes) to {}",
            self.mime_type,
            self.data.len(),
            path.as_ref().display()
        );
        Ok(())
    }
}

/// A text instruction plus the reference images that accompany it, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub images: Vec<EncodedImage>,
}

impl SynthesisRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: EncodedImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_images(mut self, images: impl IntoIterator<Item = EncodedImage>) -> Self {
        self.images.extend(images);
        self
    }
}

// Image payloads are large; print only their shape.
impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}
