//! Curate inspiration images from Pinterest, distill them into a taste profile
//! with Gemini vision, then generate, edit or try on designs with Gemini image
//! models.

pub mod config;
pub mod error;
pub mod fetch;
pub mod gemini;
pub mod logger;
pub mod models;
pub mod pinterest;
pub mod prompts;
pub mod services;
pub mod taste;
pub mod workflow;

pub use config::{Config, GeminiConfig, ProxyConfig, SearchConfig};
pub use error::{DesignError, Result};
pub use fetch::ProxyImageLoader;
pub use gemini::{GeminiClient, ImageClient, VisionClient};
pub use models::*;
pub use pinterest::PinterestClient;
pub use services::{ImageLoader, ImageSynthesizer, PinSearch, Services, TasteAnalyzer};
pub use taste::synthesize_profile;
pub use workflow::{AppState, Completion, Credentials, Pathway, Progress, SessionView, Workflow};
