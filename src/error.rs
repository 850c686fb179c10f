use crate::workflow::AppState;

#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    /// The search backend rejected the API key (HTTP 401/403).
    #[error("Invalid API key. Please check and try again.")]
    CredentialInvalid(String),

    #[error("Missing credentials: {0}")]
    CredentialMissing(String),

    #[error("Fetch failed: {0}")]
    FetchFailure(String),

    /// The vision backend answered with something that is not an aesthetic description.
    #[error("Could not parse analysis: {0}")]
    AnalysisParseFailure(String),

    #[error("Analysis failed for all selected images. Please try different pins.")]
    NoSuccessfulAnalyses,

    #[error("The model did not return any image data")]
    GenerationEmpty,

    #[error("{0}")]
    ValidationFailure(String),

    #[error("Cannot {operation} while in {state:?}")]
    InvalidTransition {
        state: AppState,
        operation: &'static str,
    },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DesignError {
    /// Errors that send the session back to credential entry.
    pub fn forces_reauth(&self) -> bool {
        matches!(self, Self::CredentialInvalid(_))
    }

    /// Whether the error is shown on the current screen as-is. Parse failures are
    /// only counted, and invalid credentials are reported by the forced transition.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            Self::AnalysisParseFailure(_) | Self::CredentialInvalid(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DesignError>;
