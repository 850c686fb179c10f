use crate::{
    error::Result,
    models::{AestheticDescription, EncodedImage, SearchPage, SynthesisRequest},
};
use async_trait::async_trait;

/// Keyword search over an image catalogue.
#[async_trait]
pub trait PinSearch: Send + Sync {
    async fn search(&self, api_key: &str, query: &str, cursor: Option<&str>)
        -> Result<SearchPage>;
}

/// Turns a remote image URL into bytes plus media type.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<EncodedImage>;
}

#[async_trait]
pub trait TasteAnalyzer: Send + Sync {
    async fn analyze(&self, api_key: &str, image: &EncodedImage) -> Result<AestheticDescription>;
}

/// Produces a new image from an instruction and zero or more reference images.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, api_key: &str, request: &SynthesisRequest) -> Result<EncodedImage>;
}
