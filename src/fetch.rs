//! Image fetch adapter.
//!
//! Remote pins are fetched through an image proxy (weserv by default), which
//! expects the target URL without its scheme.

use crate::{
    config::ProxyConfig,
    error::{DesignError, Result},
    models::{EncodedImage, DEFAULT_MIME_TYPE},
    services::ImageLoader,
};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Url};

#[derive(Clone)]
pub struct ProxyImageLoader {
    client: Client,
    proxy_base: String,
}

impl ProxyImageLoader {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("design-irl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            proxy_base: config.base_url.clone(),
        })
    }

    pub fn proxy_url(&self, url: &str) -> Result<Url> {
        let stripped = strip_scheme(url.trim());
        Url::parse_with_params(&self.proxy_base, &[("url", stripped)])
            .map_err(|e| DesignError::Config(format!("invalid proxy URL: {}", e)))
    }

    pub async fn fetch(&self, url: &str) -> Result<EncodedImage> {
        let proxied = self.proxy_url(url)?;
        log::debug!("Fetching image {} via {}", url, proxied);

        let response = self.client.get(proxied).send().await.map_err(|e| {
            DesignError::FetchFailure(format!("Failed to fetch image via proxy: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DesignError::FetchFailure(format!(
                "Failed to fetch image via proxy: {}",
                status.canonical_reason().unwrap_or(status.as_str())
            )));
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(media_type)
            .filter(|mime| !mime.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        let bytes = response.bytes().await.map_err(|e| {
            DesignError::FetchFailure(format!("Failed to read image body: {}", e))
        })?;

        Ok(EncodedImage::new(bytes.to_vec(), mime_type))
    }
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

/// `image/png; charset=binary` -> `image/png`
fn media_type(header: &str) -> &str {
    header.split(';').next().unwrap_or_default().trim()
}

#[async_trait]
impl ImageLoader for ProxyImageLoader {
    async fn load(&self, url: &str) -> Result<EncodedImage> {
        self.fetch(url).await
    }
}
