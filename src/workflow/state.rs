use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::mask_secret;
use crate::models::{EncodedImage, ImageRecord, TasteProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppState {
    Welcome,
    CredentialEntry,
    PathwaySelection,
    Search,
    Analyzing,
    TryOnSetup,
    Generating,
    Editing,
}

impl AppState {
    /// True once the user has gone through credential entry. Drives the
    /// "start over" / "change credentials" controls.
    pub fn is_past_credentials(&self) -> bool {
        match self {
            AppState::Welcome | AppState::CredentialEntry => false,
            AppState::PathwaySelection
            | AppState::Search
            | AppState::Analyzing
            | AppState::TryOnSetup
            | AppState::Generating
            | AppState::Editing => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pathway {
    /// Several inspirations distilled into a brand new room.
    Generate,
    /// One image, modified with prompts.
    Edit,
    /// The user's own photo restyled from inspirations.
    TryOn,
}

impl Pathway {
    pub fn selection_bound(&self, max_selections: usize) -> usize {
        match self {
            Pathway::Edit => 1,
            Pathway::Generate | Pathway::TryOn => max_selections,
        }
    }
}

/// API keys for the search and Gemini backends. Memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub search_api_key: String,
    pub gemini_api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("search_api_key", &mask_secret(&self.search_api_key))
            .field("gemini_api_key", &mask_secret(&self.gemini_api_key))
            .finish()
    }
}

/// Whether an async operation's result was committed to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A reset or newer request happened while this one was in flight.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Owned snapshot of the session for rendering. Never contains credentials.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub state: AppState,
    pub pathway: Option<Pathway>,
    pub has_credentials: bool,
    pub search_query: String,
    pub results: Vec<ImageRecord>,
    pub has_more_results: bool,
    pub selection: Vec<ImageRecord>,
    pub max_selections: usize,
    pub selection_bound: usize,
    pub profile: Option<TasteProfile>,
    pub room_description: String,
    pub artifact: Option<EncodedImage>,
    pub edit_prompt: String,
    pub try_on_photo: Option<EncodedImage>,
    pub try_on_prompt: String,
    pub loading: Option<String>,
    pub progress: Option<Progress>,
    pub error: Option<String>,
}

impl SessionView {
    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn is_selection_full(&self) -> bool {
        self.selection.len() >= self.selection_bound
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.iter().any(|record| record.id == id)
    }

    pub fn shows_session_controls(&self) -> bool {
        self.state.is_past_credentials()
    }
}
