pub mod traits;

use crate::{
    config::Config,
    error::Result,
    fetch::ProxyImageLoader,
    gemini::GeminiClient,
    pinterest::PinterestClient,
};
use std::sync::Arc;

pub use traits::{ImageLoader, ImageSynthesizer, PinSearch, TasteAnalyzer};

/// The external collaborators the workflow talks to.
#[derive(Clone)]
pub struct Services {
    pub search: Arc<dyn PinSearch>,
    pub loader: Arc<dyn ImageLoader>,
    pub analyzer: Arc<dyn TasteAnalyzer>,
    pub synthesizer: Arc<dyn ImageSynthesizer>,
}

impl Services {
    pub fn new(
        search: Arc<dyn PinSearch>,
        loader: Arc<dyn ImageLoader>,
        analyzer: Arc<dyn TasteAnalyzer>,
        synthesizer: Arc<dyn ImageSynthesizer>,
    ) -> Self {
        Self {
            search,
            loader,
            analyzer,
            synthesizer,
        }
    }

    /// Wires the Scrape Creators, weserv proxy and Gemini clients.
    pub fn live(config: &Config) -> Result<Self> {
        config.validate()?;

        let gemini = GeminiClient::new(&config.gemini)?;
        log::info!(
            "Using Gemini models {} (analysis) and {} (images)",
            config.gemini.analysis_model,
            config.gemini.image_model
        );

        Ok(Self {
            search: Arc::new(PinterestClient::new(&config.search)?),
            loader: Arc::new(ProxyImageLoader::new(&config.proxy)?),
            analyzer: Arc::new(gemini.vision().clone()),
            synthesizer: Arc::new(gemini.image().clone()),
        })
    }
}
