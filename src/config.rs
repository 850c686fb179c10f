use std::env;
use std::fmt;

use crate::error::{DesignError, Result};

pub const DEFAULT_SEARCH_URL: &str = "https://api.scrapecreators.com/v1/pinterest/search";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PROXY_URL: &str = "https://images.weserv.nl/";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_QUERY: &str = "Scandinavian living room";

pub const DEFAULT_MAX_SELECTIONS: usize = 5;
pub const MIN_SELECTIONS: usize = 1;
pub const MAX_SELECTIONS: usize = 10;

/// Shows the first few characters of a secret, enough to tell keys apart.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", prefix)
    }
}

fn mask_option(secret: &Option<String>) -> String {
    secret
        .as_deref()
        .map(mask_secret)
        .unwrap_or_else(|| "<unset>".to_string())
}

#[derive(Clone)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            api_key: None,
            base_url: DEFAULT_SEARCH_URL.to_string(),
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let api_key = env::var("SCRAPE_CREATORS_API_KEY").ok();
        let base_url =
            env::var("DESIGN_IRL_SEARCH_URL").unwrap_or_else(|_| DEFAULT_SEARCH_URL.to_string());

        SearchConfig { api_key, base_url }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &mask_option(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub analysis_model: String,
    pub image_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            base_url: DEFAULT_GEMINI_URL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        GeminiConfig {
            api_key: env::var("GEMINI_API_KEY").ok(),
            base_url: env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            analysis_model: env::var("GEMINI_ANALYSIS_MODEL").unwrap_or(defaults.analysis_model),
            image_model: env::var("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_models(
        mut self,
        analysis_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        self.analysis_model = analysis_model.into();
        self.image_model = image_model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &mask_option(&self.api_key))
            .field("base_url", &self.base_url)
            .field("analysis_model", &self.analysis_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub base_url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            base_url: DEFAULT_PROXY_URL.to_string(),
        }
    }
}

impl ProxyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let base_url =
            env::var("IMAGE_PROXY_URL").unwrap_or_else(|_| DEFAULT_PROXY_URL.to_string());
        ProxyConfig { base_url }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub search: SearchConfig,
    pub gemini: GeminiConfig,
    pub proxy: ProxyConfig,
    pub max_selections: usize,
    pub default_query: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            search: SearchConfig::default(),
            gemini: GeminiConfig::default(),
            proxy: ProxyConfig::default(),
            max_selections: DEFAULT_MAX_SELECTIONS,
            default_query: DEFAULT_QUERY.to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let max_selections = env::var("DESIGN_IRL_MAX_SELECTIONS")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(DEFAULT_MAX_SELECTIONS);

        Config {
            search: SearchConfig::from_env(),
            gemini: GeminiConfig::from_env(),
            proxy: ProxyConfig::from_env(),
            max_selections,
            default_query: DEFAULT_QUERY.to_string(),
        }
    }

    pub fn with_search(mut self, config: SearchConfig) -> Self {
        self.search = config;
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn with_proxy(mut self, config: ProxyConfig) -> Self {
        self.proxy = config;
        self
    }

    pub fn with_max_selections(mut self, max_selections: usize) -> Self {
        self.max_selections = max_selections;
        self
    }

    pub fn with_default_query(mut self, query: impl Into<String>) -> Self {
        self.default_query = query.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_max_selections(self.max_selections)
            .map_err(|_| DesignError::Config(format!(
                "max_selections must be between {} and {}, got {}",
                MIN_SELECTIONS, MAX_SELECTIONS, self.max_selections
            )))?;
        if self.search.base_url.is_empty() || self.gemini.base_url.is_empty() {
            return Err(DesignError::Config("service base URLs must not be empty".into()));
        }
        Ok(())
    }
}

pub fn validate_max_selections(value: usize) -> Result<()> {
    if (MIN_SELECTIONS..=MAX_SELECTIONS).contains(&value) {
        Ok(())
    } else {
        Err(DesignError::ValidationFailure(format!(
            "Selection limit must be between {} and {}.",
            MIN_SELECTIONS, MAX_SELECTIONS
        )))
    }
}
