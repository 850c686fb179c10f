//! The session state machine.
//!
//! `Workflow` owns every piece of session state behind a single async mutex and
//! exposes transitions only as named operations. The lock is never held across a
//! backend call: each async operation snapshots its inputs, releases the lock,
//! awaits the service, then re-locks and applies the result only if the session
//! token it captured is still current. Resets and newer requests advance the
//! token, so late responses are dropped instead of overwriting newer state.

pub mod selection;
pub mod state;

use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    config::{validate_max_selections, Config},
    error::{DesignError, Result},
    logger,
    models::{AestheticDescription, EncodedImage, ImageRecord, SynthesisRequest, TasteProfile},
    prompts,
    services::Services,
    taste::synthesize_profile,
};

pub use selection::Selection;
pub use state::{AppState, Completion, Credentials, Pathway, Progress, SessionView};

const MSG_CREDENTIALS_REQUIRED: &str = "Please enter both Scrape Creators and Gemini API keys.";
const MSG_QUERY_REQUIRED: &str = "Please enter a search query.";
const MSG_NO_RESULTS: &str = "No results found. Try a different keyword.";
const MSG_NO_MORE_RESULTS: &str = "There are no more results to load.";
const MSG_SELECT_TO_ANALYZE: &str = "Select at least one image to analyze.";
const MSG_SELECT_ONE_TO_EDIT: &str = "Select exactly one image to edit.";
const MSG_SELECT_INSPIRATION: &str = "Select at least one inspiration image.";
const MSG_ROOM_REQUIRED: &str = "Please describe the space you want to create.";
const MSG_EDIT_REQUIRED: &str = "Please enter an edit instruction.";
const MSG_TRY_ON_REQUIRED: &str =
    "Please upload your photo, select at least one inspiration, and provide a prompt.";
const MSG_LOAD_FOR_EDIT_FAILED: &str = "Failed to load image for editing. Please try again.";
const MSG_GENERATE_FAILED: &str = "Failed to generate mockup. Please try again.";
const MSG_EDIT_FAILED: &str = "Failed to edit image. Please try again.";
const MSG_TRY_ON_FAILED: &str = "Failed to perform virtual try-on. Please try again.";

struct Session {
    token: u64,
    state: AppState,
    pathway: Option<Pathway>,
    credentials: Option<Credentials>,
    search_query: String,
    results: Vec<ImageRecord>,
    next_cursor: Option<String>,
    selection: Selection,
    max_selections: usize,
    profile: Option<TasteProfile>,
    room_description: String,
    artifact: Option<EncodedImage>,
    edit_prompt: String,
    try_on_photo: Option<EncodedImage>,
    try_on_prompt: String,
    loading: Option<String>,
    progress: Option<Progress>,
    error: Option<String>,
}

impl Session {
    fn new(config: &Config) -> Self {
        Self {
            token: 0,
            state: AppState::Welcome,
            pathway: None,
            credentials: None,
            search_query: config.default_query.clone(),
            results: Vec::new(),
            next_cursor: None,
            selection: Selection::new(),
            max_selections: config.max_selections,
            profile: None,
            room_description: String::new(),
            artifact: None,
            edit_prompt: String::new(),
            try_on_photo: None,
            try_on_prompt: String::new(),
            loading: None,
            progress: None,
            error: None,
        }
    }

    fn expect_state(&self, expected: AppState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DesignError::InvalidTransition {
                state: self.state,
                operation,
            })
        }
    }

    fn expect_pathway(&self, expected: Pathway, operation: &'static str) -> Result<()> {
        if self.pathway == Some(expected) {
            Ok(())
        } else {
            Err(DesignError::InvalidTransition {
                state: self.state,
                operation,
            })
        }
    }

    fn selection_bound(&self) -> usize {
        self.pathway
            .map(|p| p.selection_bound(self.max_selections))
            .unwrap_or(self.max_selections)
    }

    fn credentials(&self) -> Result<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| DesignError::CredentialMissing(MSG_CREDENTIALS_REQUIRED.into()))
    }

    /// Records a user-facing validation message and returns it as an error.
    fn reject(&mut self, message: &str) -> DesignError {
        self.error = Some(message.to_string());
        DesignError::ValidationFailure(message.to_string())
    }

    fn begin_request(&mut self, message: impl Into<String>) -> u64 {
        self.token += 1;
        self.loading = Some(message.into());
        self.progress = None;
        self.error = None;
        self.token
    }

    fn is_current(&self, token: u64) -> bool {
        self.token == token
    }

    fn finish_request(&mut self) {
        self.loading = None;
        self.progress = None;
    }

    /// Orphans every in-flight request.
    fn invalidate(&mut self) {
        self.token += 1;
        self.finish_request();
    }

    fn clear_search(&mut self) {
        self.results.clear();
        self.selection.clear();
        self.next_cursor = None;
        self.error = None;
    }

    fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            pathway: self.pathway,
            has_credentials: self.credentials.is_some(),
            search_query: self.search_query.clone(),
            results: self.results.clone(),
            has_more_results: self.next_cursor.is_some(),
            selection: self.selection.items().to_vec(),
            max_selections: self.max_selections,
            selection_bound: self.selection_bound(),
            profile: self.profile.clone(),
            room_description: self.room_description.clone(),
            artifact: self.artifact.clone(),
            edit_prompt: self.edit_prompt.clone(),
            try_on_photo: self.try_on_photo.clone(),
            try_on_prompt: self.try_on_prompt.clone(),
            loading: self.loading.clone(),
            progress: self.progress,
            error: self.error.clone(),
        }
    }
}

/// Drives the generate, edit and try-on journeys. Cheap to clone; clones share
/// the same session.
#[derive(Clone)]
pub struct Workflow {
    services: Services,
    session: Arc<Mutex<Session>>,
    label: String,
}

impl Workflow {
    pub fn new(services: Services, config: &Config) -> Result<Self> {
        validate_max_selections(config.max_selections)?;

        let id = Uuid::new_v4().simple().to_string();
        let label = id.chars().take(8).collect();
        Ok(Self {
            services,
            session: Arc::new(Mutex::new(Session::new(config))),
            label,
        })
    }

    pub async fn view(&self) -> SessionView {
        self.session.lock().await.view()
    }

    pub async fn state(&self) -> AppState {
        self.session.lock().await.state
    }

    // Navigation

    pub async fn proceed(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::Welcome, "proceed")?;
        session.state = AppState::CredentialEntry;
        Ok(())
    }

    pub async fn submit_credentials(&self, search_api_key: &str, gemini_api_key: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::CredentialEntry, "submit credentials")?;

        let search_api_key = search_api_key.trim();
        let gemini_api_key = gemini_api_key.trim();
        if search_api_key.is_empty() || gemini_api_key.is_empty() {
            session.error = Some(MSG_CREDENTIALS_REQUIRED.to_string());
            return Err(DesignError::CredentialMissing(MSG_CREDENTIALS_REQUIRED.into()));
        }

        session.credentials = Some(Credentials {
            search_api_key: search_api_key.to_string(),
            gemini_api_key: gemini_api_key.to_string(),
        });
        session.state = AppState::PathwaySelection;
        session.error = None;
        log::info!("[{}] Credentials accepted", self.label);
        Ok(())
    }

    /// Back to credential entry without discarding session data.
    pub async fn change_credentials(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if !session.state.is_past_credentials() {
            return Err(DesignError::InvalidTransition {
                state: session.state,
                operation: "change credentials",
            });
        }
        session.invalidate();
        session.state = AppState::CredentialEntry;
        session.error = None;
        log::info!("[{}] Credentials requested again", self.label);
        Ok(())
    }

    pub async fn choose_pathway(&self, pathway: Pathway) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::PathwaySelection, "choose a pathway")?;

        if session.pathway.is_some() && session.pathway != Some(pathway) {
            // Selection bounds differ per pathway.
            session.selection.clear();
        }
        session.pathway = Some(pathway);
        session.state = AppState::Search;
        log::info!("[{}] Pathway chosen: {:?}", self.label, pathway);
        Ok(())
    }

    /// Clears everything downstream of credentials and returns to pathway selection.
    pub async fn start_over(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if !session.state.is_past_credentials() {
            return Err(DesignError::InvalidTransition {
                state: session.state,
                operation: "start over",
            });
        }

        session.invalidate();
        session.state = AppState::PathwaySelection;
        session.pathway = None;
        session.profile = None;
        session.room_description.clear();
        session.artifact = None;
        session.edit_prompt.clear();
        session.try_on_photo = None;
        session.try_on_prompt.clear();
        session.clear_search();
        log::info!("[{}] Session reset", self.label);
        Ok(())
    }

    // Search and selection

    pub async fn set_search_query(&self, query: impl Into<String>) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::Search, "edit the search query")?;
        session.search_query = query.into();
        Ok(())
    }

    pub async fn search(&self) -> Result<Completion> {
        self.run_search(false).await
    }

    pub async fn load_more(&self) -> Result<Completion> {
        self.run_search(true).await
    }

    async fn run_search(&self, load_more: bool) -> Result<Completion> {
        let (token, api_key, query, cursor) = {
            let mut session = self.session.lock().await;
            session.expect_state(AppState::Search, "search")?;

            let query = session.search_query.trim().to_string();
            if query.is_empty() {
                return Err(session.reject(MSG_QUERY_REQUIRED));
            }
            let cursor = if load_more {
                match session.next_cursor.clone() {
                    Some(cursor) => Some(cursor),
                    None => return Err(session.reject(MSG_NO_MORE_RESULTS)),
                }
            } else {
                None
            };
            let api_key = session.credentials()?.search_api_key.clone();
            let token = session.begin_request("Searching for inspiration...");
            (token, api_key, query, cursor)
        };

        let result = self
            .services
            .search
            .search(&api_key, &query, cursor.as_deref())
            .await;

        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            log::debug!("[{}] Discarding superseded search for {:?}", self.label, query);
            return Ok(Completion::Superseded);
        }
        session.finish_request();

        match result {
            Ok(page) => {
                if load_more {
                    let fresh: Vec<ImageRecord> = page
                        .items
                        .into_iter()
                        .filter(|item| !session.results.iter().any(|r| r.id == item.id))
                        .collect();
                    session.results.extend(fresh);
                } else {
                    if page.items.is_empty() {
                        session.error = Some(MSG_NO_RESULTS.to_string());
                    }
                    session.results = page.items;
                }
                session.next_cursor = page.continuation_token;
                log::info!(
                    "[{}] {} results for {:?}",
                    self.label,
                    session.results.len(),
                    query
                );
                Ok(Completion::Applied)
            }
            Err(e) => {
                log::error!("[{}] Search failed: {}", self.label, e);
                session.results.clear();
                session.next_cursor = None;
                session.error = Some(e.to_string());
                if e.forces_reauth() {
                    session.state = AppState::CredentialEntry;
                }
                Err(e)
            }
        }
    }

    pub async fn reset_search(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::Search, "reset the search")?;
        session.invalidate();
        session.clear_search();
        Ok(())
    }

    pub async fn set_max_selections(&self, max_selections: usize) -> Result<()> {
        let mut session = self.session.lock().await;
        if let Err(e) = validate_max_selections(max_selections) {
            session.error = Some(e.to_string());
            return Err(e);
        }
        session.max_selections = max_selections;
        Ok(())
    }

    /// Edit uses radio semantics; the other pathways toggle within the bound.
    pub async fn toggle_selection(&self, record: &ImageRecord) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::Search, "select an image")?;

        let pathway = session.pathway;
        match pathway {
            Some(Pathway::Edit) => session.selection.select_only(record),
            Some(_) => {
                let bound = session.selection_bound();
                if !session.selection.toggle(record, bound) {
                    log::debug!(
                        "[{}] Selection is full ({}), ignoring {}",
                        self.label,
                        bound,
                        record.id
                    );
                }
            }
            None => {
                return Err(DesignError::InvalidTransition {
                    state: session.state,
                    operation: "select an image",
                })
            }
        }
        Ok(())
    }

    // Generate pathway

    /// Fetches and analyzes every selected image in order, then synthesizes the
    /// taste profile from whichever analyses succeeded.
    pub async fn analyze_taste(&self) -> Result<Completion> {
        let (token, api_key, selection) = {
            let mut session = self.session.lock().await;
            session.expect_state(AppState::Search, "analyze taste")?;
            session.expect_pathway(Pathway::Generate, "analyze taste")?;
            if session.selection.is_empty() {
                return Err(session.reject(MSG_SELECT_TO_ANALYZE));
            }

            let api_key = session.credentials()?.gemini_api_key.clone();
            let selection = session.selection.items().to_vec();
            session.state = AppState::Analyzing;
            let token = session.begin_request("Analyzing your pins...");
            (token, api_key, selection)
        };

        let _timer = logger::timer("taste analysis");
        let total = selection.len();
        let mut analyses = Vec::with_capacity(total);

        for (index, record) in selection.iter().enumerate() {
            {
                let mut session = self.session.lock().await;
                if !session.is_current(token) {
                    log::debug!(
                        "[{}] Analysis superseded after {}/{} images",
                        self.label,
                        index,
                        total
                    );
                    return Ok(Completion::Superseded);
                }
                session.loading = Some(format!("Analyzing {}/{} pins...", index + 1, total));
                session.progress = Some(Progress {
                    completed: index,
                    total,
                });
            }

            match self.fetch_and_analyze(&api_key, record).await {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => log::warn!(
                    "[{}] Could not analyze image {}, skipping it: {}",
                    self.label,
                    record.id,
                    e
                ),
            }
        }

        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            return Ok(Completion::Superseded);
        }
        session.finish_request();

        log::info!(
            "[{}] {}/{} images analyzed successfully",
            self.label,
            analyses.len(),
            total
        );

        match synthesize_profile(&analyses) {
            Ok(profile) => {
                session.profile = Some(profile);
                session.state = AppState::Generating;
                Ok(Completion::Applied)
            }
            Err(e) => {
                session.error = Some(e.to_string());
                session.state = AppState::Search;
                Err(e)
            }
        }
    }

    async fn fetch_and_analyze(
        &self,
        api_key: &str,
        record: &ImageRecord,
    ) -> Result<AestheticDescription> {
        let image = self.services.loader.load(&record.image_url).await?;
        self.services.analyzer.analyze(api_key, &image).await
    }

    pub async fn set_room_description(&self, description: impl Into<String>) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::Generating, "describe the room")?;
        session.room_description = description.into();
        Ok(())
    }

    pub async fn generate_room(&self) -> Result<Completion> {
        let (token, api_key, request) = {
            let mut session = self.session.lock().await;
            session.expect_state(AppState::Generating, "generate a room")?;

            let room = session.room_description.trim().to_string();
            let profile = match (&session.profile, room.is_empty()) {
                (Some(profile), false) => profile.clone(),
                _ => return Err(session.reject(MSG_ROOM_REQUIRED)),
            };

            let api_key = session.credentials()?.gemini_api_key.clone();
            let request = SynthesisRequest::new(prompts::room_prompt(&profile, &room));
            let token = session.begin_request("Brewing up your design...");
            (token, api_key, request)
        };

        let result = self.services.synthesizer.synthesize(&api_key, &request).await;

        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            log::debug!("[{}] Discarding superseded room generation", self.label);
            return Ok(Completion::Superseded);
        }
        session.finish_request();

        match result {
            Ok(image) => {
                session.artifact = Some(image);
                session.state = AppState::Editing;
                Ok(Completion::Applied)
            }
            Err(e) => {
                log::error!("[{}] Room generation failed: {}", self.label, e);
                session.error = Some(MSG_GENERATE_FAILED.to_string());
                session.state = AppState::Generating;
                Err(e)
            }
        }
    }

    // Edit pathway

    /// Loads the single selected image as the working artifact. No model call.
    pub async fn start_editing_from_selection(&self) -> Result<Completion> {
        let (token, url) = {
            let mut session = self.session.lock().await;
            session.expect_state(AppState::Search, "start editing")?;
            session.expect_pathway(Pathway::Edit, "start editing")?;
            let url = match session.selection.items() {
                [only] => only.image_url.clone(),
                _ => return Err(session.reject(MSG_SELECT_ONE_TO_EDIT)),
            };
            let token = session.begin_request("Preparing image for editing...");
            (token, url)
        };

        let result = self.services.loader.load(&url).await;

        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            return Ok(Completion::Superseded);
        }
        session.finish_request();

        match result {
            Ok(image) => {
                session.artifact = Some(image);
                session.state = AppState::Editing;
                Ok(Completion::Applied)
            }
            Err(e) => {
                log::error!("[{}] Could not load {} for editing: {}", self.label, url, e);
                session.error = Some(MSG_LOAD_FOR_EDIT_FAILED.to_string());
                session.state = AppState::Search;
                Err(e)
            }
        }
    }

    pub async fn set_edit_prompt(&self, prompt: impl Into<String>) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::Editing, "write an edit prompt")?;
        session.edit_prompt = prompt.into();
        Ok(())
    }

    /// Applies the edit prompt to the current artifact. A failed edit keeps the
    /// previous artifact.
    pub async fn apply_edit(&self) -> Result<Completion> {
        let (token, api_key, request) = {
            let mut session = self.session.lock().await;
            session.expect_state(AppState::Editing, "edit the image")?;

            let instruction = session.edit_prompt.trim().to_string();
            let artifact = match (&session.artifact, instruction.is_empty()) {
                (Some(artifact), false) => artifact.clone(),
                _ => return Err(session.reject(MSG_EDIT_REQUIRED)),
            };

            let api_key = session.credentials()?.gemini_api_key.clone();
            let request =
                SynthesisRequest::new(prompts::edit_prompt(&instruction)).with_image(artifact);
            let token = session.begin_request("Understanding your changes...");
            (token, api_key, request)
        };

        let result = self.services.synthesizer.synthesize(&api_key, &request).await;

        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            log::debug!("[{}] Discarding superseded edit", self.label);
            return Ok(Completion::Superseded);
        }
        session.finish_request();

        match result {
            Ok(image) => {
                session.artifact = Some(image);
                session.edit_prompt.clear();
                Ok(Completion::Applied)
            }
            Err(e) => {
                log::error!("[{}] Edit failed: {}", self.label, e);
                session.error = Some(MSG_EDIT_FAILED.to_string());
                Err(e)
            }
        }
    }

    // Try-on pathway

    pub async fn proceed_to_try_on(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::Search, "set up a try-on")?;
        session.expect_pathway(Pathway::TryOn, "set up a try-on")?;
        if session.selection.is_empty() {
            return Err(session.reject(MSG_SELECT_INSPIRATION));
        }
        session.error = None;
        session.state = AppState::TryOnSetup;
        Ok(())
    }

    pub async fn set_try_on_photo(&self, photo: EncodedImage) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::TryOnSetup, "upload a photo")?;
        session.try_on_photo = Some(photo);
        Ok(())
    }

    pub async fn clear_try_on_photo(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::TryOnSetup, "remove the photo")?;
        session.try_on_photo = None;
        Ok(())
    }

    pub async fn set_try_on_prompt(&self, prompt: impl Into<String>) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_state(AppState::TryOnSetup, "write a try-on prompt")?;
        session.try_on_prompt = prompt.into();
        Ok(())
    }

    /// Restyles the user's photo from the selected inspirations. Inspiration
    /// images are fetched concurrently; any fetch failure fails the try-on.
    pub async fn virtual_try_on(&self) -> Result<Completion> {
        let (token, api_key, photo, urls, prompt) = {
            let mut session = self.session.lock().await;
            session.expect_state(AppState::TryOnSetup, "run the try-on")?;

            let prompt = session.try_on_prompt.trim().to_string();
            let photo = match &session.try_on_photo {
                Some(photo) if !prompt.is_empty() && !session.selection.is_empty() => {
                    photo.clone()
                }
                _ => return Err(session.reject(MSG_TRY_ON_REQUIRED)),
            };

            let api_key = session.credentials()?.gemini_api_key.clone();
            let urls: Vec<String> = session
                .selection
                .items()
                .iter()
                .map(|record| record.image_url.clone())
                .collect();
            let token = session.begin_request(format!(
                "Converting {} inspiration images...",
                urls.len()
            ));
            (token, api_key, photo, urls, prompt)
        };

        let result = self.try_on(token, &api_key, photo, &urls, &prompt).await;

        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            log::debug!("[{}] Discarding superseded try-on", self.label);
            return Ok(Completion::Superseded);
        }
        session.finish_request();

        match result {
            Ok(image) => {
                session.artifact = Some(image);
                session.state = AppState::Editing;
                Ok(Completion::Applied)
            }
            Err(e) => {
                log::error!("[{}] Virtual try-on failed: {}", self.label, e);
                session.error = Some(MSG_TRY_ON_FAILED.to_string());
                session.state = AppState::TryOnSetup;
                Err(e)
            }
        }
    }

    async fn try_on(
        &self,
        token: u64,
        api_key: &str,
        photo: EncodedImage,
        urls: &[String],
        prompt: &str,
    ) -> Result<EncodedImage> {
        let loader = &self.services.loader;
        let inspirations = try_join_all(urls.iter().map(|url| loader.load(url))).await?;

        {
            let mut session = self.session.lock().await;
            if session.is_current(token) {
                session.loading = Some("Applying styles with AI...".to_string());
            }
        }

        let request = SynthesisRequest::new(prompts::try_on_prompt(prompt))
            .with_image(photo)
            .with_images(inspirations);
        self.services.synthesizer.synthesize(api_key, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchPage;
    use crate::services::{ImageLoader, ImageSynthesizer, PinSearch, TasteAnalyzer};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    fn record(id: &str) -> ImageRecord {
        ImageRecord::new(id, format!("https://i.pinimg.com/{}.jpg", id))
    }

    fn description(color: &str, material: &str, mood: &str) -> AestheticDescription {
        AestheticDescription::new([color], [material], "open", mood)
    }

    enum SearchReply {
        Page(Vec<&'static str>, Option<&'static str>),
        Unauthorized,
        Unavailable,
    }

    /// Holds a call open until `release` is notified.
    type Gate = Option<(Arc<Notify>, Arc<Notify>)>;

    async fn pass(gate: &Gate) {
        if let Some((started, release)) = gate {
            started.notify_one();
            release.notified().await;
        }
    }

    #[derive(Default)]
    struct FakeSearch {
        replies: StdMutex<VecDeque<SearchReply>>,
        cursors: StdMutex<Vec<Option<String>>>,
        gate: Gate,
    }

    impl FakeSearch {
        fn with(replies: Vec<SearchReply>) -> Self {
            Self {
                replies: StdMutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn gated(mut self, started: Arc<Notify>, release: Arc<Notify>) -> Self {
            self.gate = Some((started, release));
            self
        }
    }

    #[async_trait]
    impl PinSearch for FakeSearch {
        async fn search(
            &self,
            _api_key: &str,
            _query: &str,
            cursor: Option<&str>,
        ) -> Result<SearchPage> {
            self.cursors.lock().unwrap().push(cursor.map(String::from));
            pass(&self.gate).await;
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(SearchReply::Page(ids, next)) => Ok(SearchPage {
                    items: ids.into_iter().map(record).collect(),
                    continuation_token: next.map(String::from),
                }),
                Some(SearchReply::Unauthorized) => {
                    Err(DesignError::CredentialInvalid("401".into()))
                }
                Some(SearchReply::Unavailable) | None => {
                    Err(DesignError::FetchFailure("503".into()))
                }
            }
        }
    }

    /// Serves the URL itself as image bytes so analyzers can tell images apart.
    #[derive(Default)]
    struct FakeLoader {
        failing: HashSet<String>,
        loads: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageLoader for FakeLoader {
        async fn load(&self, url: &str) -> Result<EncodedImage> {
            self.loads.lock().unwrap().push(url.to_string());
            if self.failing.contains(url) {
                return Err(DesignError::FetchFailure(format!("404 for {}", url)));
            }
            Ok(EncodedImage::new(url.as_bytes().to_vec(), "image/jpeg"))
        }
    }

    #[derive(Default)]
    struct FakeAnalyzer {
        by_url: HashMap<String, AestheticDescription>,
        calls: StdMutex<Vec<String>>,
        gate: Gate,
    }

    #[async_trait]
    impl TasteAnalyzer for FakeAnalyzer {
        async fn analyze(
            &self,
            _api_key: &str,
            image: &EncodedImage,
        ) -> Result<AestheticDescription> {
            let url = String::from_utf8_lossy(&image.data).to_string();
            self.calls.lock().unwrap().push(url.clone());
            pass(&self.gate).await;
            self.by_url
                .get(&url)
                .cloned()
                .ok_or_else(|| DesignError::AnalysisParseFailure("not json".into()))
        }
    }

    #[derive(Default)]
    struct FakeSynthesizer {
        fail: bool,
        requests: StdMutex<Vec<SynthesisRequest>>,
        gate: Gate,
    }

    impl FakeSynthesizer {
        fn gated(started: Arc<Notify>, release: Arc<Notify>) -> Self {
            Self {
                gate: Some((started, release)),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ImageSynthesizer for FakeSynthesizer {
        async fn synthesize(
            &self,
            _api_key: &str,
            request: &SynthesisRequest,
        ) -> Result<EncodedImage> {
            self.requests.lock().unwrap().push(request.clone());
            pass(&self.gate).await;
            if self.fail {
                return Err(DesignError::GenerationEmpty);
            }
            let n = self.requests.lock().unwrap().len();
            Ok(EncodedImage::new(vec![n as u8], "image/png"))
        }
    }

    struct Harness {
        workflow: Workflow,
        search: Arc<FakeSearch>,
        loader: Arc<FakeLoader>,
        analyzer: Arc<FakeAnalyzer>,
        synthesizer: Arc<FakeSynthesizer>,
    }

    fn harness(
        search: FakeSearch,
        loader: FakeLoader,
        analyzer: FakeAnalyzer,
        synthesizer: FakeSynthesizer,
    ) -> Harness {
        let search = Arc::new(search);
        let loader = Arc::new(loader);
        let analyzer = Arc::new(analyzer);
        let synthesizer = Arc::new(synthesizer);
        let services = Services::new(
            search.clone(),
            loader.clone(),
            analyzer.clone(),
            synthesizer.clone(),
        );
        Harness {
            workflow: Workflow::new(services, &Config::default()).unwrap(),
            search,
            loader,
            analyzer,
            synthesizer,
        }
    }

    fn default_harness() -> Harness {
        harness(
            FakeSearch::default(),
            FakeLoader::default(),
            FakeAnalyzer::default(),
            FakeSynthesizer::default(),
        )
    }

    async fn enter_search(workflow: &Workflow, pathway: Pathway) {
        workflow.proceed().await.unwrap();
        workflow.submit_credentials("sc-key", "gm-key").await.unwrap();
        workflow.choose_pathway(pathway).await.unwrap();
    }

    async fn select(workflow: &Workflow, ids: &[&str]) {
        for id in ids {
            workflow.toggle_selection(&record(id)).await.unwrap();
        }
    }

    fn ids(records: &[ImageRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_credentials_must_both_be_present() {
        let h = default_harness();
        h.workflow.proceed().await.unwrap();

        let err = h.workflow.submit_credentials("sc-key", "   ").await.unwrap_err();
        assert!(matches!(err, DesignError::CredentialMissing(_)));
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::CredentialEntry);
        assert_eq!(view.error.as_deref(), Some(MSG_CREDENTIALS_REQUIRED));
        assert!(!view.has_credentials);
        assert!(!view.shows_session_controls());

        h.workflow.submit_credentials("sc-key", "gm-key").await.unwrap();
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::PathwaySelection);
        assert!(view.error.is_none());
        assert!(view.has_credentials);
        assert!(view.shows_session_controls());
    }

    #[tokio::test]
    async fn test_out_of_order_operations_are_rejected() {
        let h = default_harness();
        let err = h.workflow.choose_pathway(Pathway::Generate).await.unwrap_err();
        assert!(matches!(err, DesignError::InvalidTransition { .. }));
        assert!(h.workflow.start_over().await.is_err());
        assert!(h.workflow.change_credentials().await.is_err());
        assert_eq!(h.workflow.state().await, AppState::Welcome);
    }

    #[tokio::test]
    async fn test_search_then_load_more_appends() {
        let h = harness(
            FakeSearch::with(vec![
                SearchReply::Page(vec!["a", "b"], Some("page-2")),
                SearchReply::Page(vec!["b", "c"], None),
            ]),
            FakeLoader::default(),
            FakeAnalyzer::default(),
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::Generate).await;

        assert_eq!(h.workflow.search().await.unwrap(), Completion::Applied);
        assert!(h.workflow.view().await.has_more_results);

        h.workflow.load_more().await.unwrap();
        let view = h.workflow.view().await;
        assert_eq!(ids(&view.results), vec!["a", "b", "c"]);
        assert!(!view.has_more_results);
        assert!(!view.is_loading());

        let cursors = h.search.cursors.lock().unwrap().clone();
        assert_eq!(cursors, vec![None, Some("page-2".to_string())]);

        let err = h.workflow.load_more().await.unwrap_err();
        assert!(matches!(err, DesignError::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let h = default_harness();
        enter_search(&h.workflow, Pathway::Generate).await;
        h.workflow.set_search_query("   ").await.unwrap();

        let err = h.workflow.search().await.unwrap_err();
        assert!(matches!(err, DesignError::ValidationFailure(_)));
        assert_eq!(h.workflow.view().await.error.as_deref(), Some(MSG_QUERY_REQUIRED));
        assert!(h.search.cursors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_results_leave_a_notice() {
        let h = harness(
            FakeSearch::with(vec![SearchReply::Page(vec![], None)]),
            FakeLoader::default(),
            FakeAnalyzer::default(),
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::Generate).await;

        h.workflow.search().await.unwrap();
        assert_eq!(h.workflow.view().await.error.as_deref(), Some(MSG_NO_RESULTS));
    }

    #[tokio::test]
    async fn test_search_auth_failure_forces_credential_entry() {
        let h = harness(
            FakeSearch::with(vec![SearchReply::Unauthorized]),
            FakeLoader::default(),
            FakeAnalyzer::default(),
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::TryOn).await;

        let err = h.workflow.search().await.unwrap_err();
        assert!(err.forces_reauth());
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::CredentialEntry);
        assert!(view.results.is_empty());
    }

    #[tokio::test]
    async fn test_generic_search_failure_stays_in_search() {
        let h = harness(
            FakeSearch::with(vec![SearchReply::Unavailable]),
            FakeLoader::default(),
            FakeAnalyzer::default(),
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::Generate).await;

        assert!(h.workflow.search().await.is_err());
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Search);
        assert!(view.error.is_some());
    }

    #[tokio::test]
    async fn test_reset_search_clears_results_and_selection() {
        let h = harness(
            FakeSearch::with(vec![SearchReply::Page(vec!["a", "b"], Some("next"))]),
            FakeLoader::default(),
            FakeAnalyzer::default(),
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::Generate).await;
        h.workflow.search().await.unwrap();
        select(&h.workflow, &["a"]).await;

        h.workflow.reset_search().await.unwrap();
        let view = h.workflow.view().await;
        assert!(view.results.is_empty());
        assert!(view.selection.is_empty());
        assert!(!view.has_more_results);
        assert_eq!(view.state, AppState::Search);
    }

    #[tokio::test]
    async fn test_bounded_toggle_in_generate_pathway() {
        let h = default_harness();
        enter_search(&h.workflow, Pathway::Generate).await;
        h.workflow.set_max_selections(2).await.unwrap();

        select(&h.workflow, &["a", "b", "c"]).await;
        let view = h.workflow.view().await;
        assert_eq!(ids(&view.selection), vec!["a", "b"]);
        assert!(view.is_selection_full());

        select(&h.workflow, &["a"]).await;
        assert_eq!(ids(&h.workflow.view().await.selection), vec!["b"]);
    }

    #[tokio::test]
    async fn test_edit_pathway_selection_is_radio() {
        let h = default_harness();
        enter_search(&h.workflow, Pathway::Edit).await;

        select(&h.workflow, &["a", "b"]).await;
        let view = h.workflow.view().await;
        assert_eq!(ids(&view.selection), vec!["b"]);
        assert_eq!(view.selection_bound, 1);
    }

    #[tokio::test]
    async fn test_max_selections_range() {
        let h = default_harness();
        assert!(h.workflow.set_max_selections(0).await.is_err());
        assert!(h.workflow.set_max_selections(11).await.is_err());
        h.workflow.set_max_selections(10).await.unwrap();
        assert_eq!(h.workflow.view().await.max_selections, 10);
    }

    fn analysis_harness(failing_analysis: &[&str]) -> Harness {
        let mut analyzer = FakeAnalyzer::default();
        for (id, color, mood) in [("1", "#111", "calm"), ("2", "#222", "bold"), ("3", "#111", "airy")] {
            if !failing_analysis.contains(&id) {
                analyzer
                    .by_url
                    .insert(record(id).image_url, description(color, "oak", mood));
            }
        }
        harness(
            FakeSearch::default(),
            FakeLoader::default(),
            analyzer,
            FakeSynthesizer::default(),
        )
    }

    #[tokio::test]
    async fn test_batch_analysis_skips_failed_images() {
        let h = analysis_harness(&["2"]);
        enter_search(&h.workflow, Pathway::Generate).await;
        select(&h.workflow, &["1", "2", "3"]).await;

        assert_eq!(h.workflow.analyze_taste().await.unwrap(), Completion::Applied);

        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Generating);
        let profile = view.profile.clone().unwrap();
        assert_eq!(profile.colors, vec!["#111"]);
        assert_eq!(profile.textures, vec!["oak"]);
        assert_eq!(profile.moods, vec!["calm", "airy"]);
        assert!(view.error.is_none());
        assert!(!view.is_loading());

        let calls = h.analyzer.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![record("1").image_url, record("2").image_url, record("3").image_url]
        );
    }

    #[tokio::test]
    async fn test_batch_analysis_total_failure_returns_to_search() {
        let h = analysis_harness(&["1", "2", "3"]);
        enter_search(&h.workflow, Pathway::Generate).await;
        select(&h.workflow, &["1", "2", "3"]).await;

        let err = h.workflow.analyze_taste().await.unwrap_err();
        assert!(matches!(err, DesignError::NoSuccessfulAnalyses));

        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Search);
        assert!(view.profile.is_none());
        assert_eq!(
            view.error.as_deref(),
            Some("Analysis failed for all selected images. Please try different pins.")
        );
    }

    #[tokio::test]
    async fn test_fetch_failures_count_as_analysis_failures() {
        let mut analyzer = FakeAnalyzer::default();
        analyzer
            .by_url
            .insert(record("2").image_url, description("#abc", "linen", "cozy"));
        let mut loader = FakeLoader::default();
        loader.failing.insert(record("1").image_url);
        let h = harness(FakeSearch::default(), loader, analyzer, FakeSynthesizer::default());
        enter_search(&h.workflow, Pathway::Generate).await;
        select(&h.workflow, &["1", "2"]).await;

        h.workflow.analyze_taste().await.unwrap();
        let profile = h.workflow.view().await.profile.unwrap();
        assert_eq!(profile.moods, vec!["cozy"]);
        assert_eq!(h.analyzer.calls.lock().unwrap().len(), 1);
    }

    async fn generated_room(h: &Harness) {
        enter_search(&h.workflow, Pathway::Generate).await;
        select(&h.workflow, &["1"]).await;
        h.workflow.analyze_taste().await.unwrap();
        h.workflow.set_room_description("reading nook").await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_room_requires_description() {
        let h = analysis_harness(&[]);
        enter_search(&h.workflow, Pathway::Generate).await;
        select(&h.workflow, &["1"]).await;
        h.workflow.analyze_taste().await.unwrap();

        let err = h.workflow.generate_room().await.unwrap_err();
        assert!(matches!(err, DesignError::ValidationFailure(_)));
        assert_eq!(h.workflow.view().await.error.as_deref(), Some(MSG_ROOM_REQUIRED));
        assert!(h.synthesizer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_room_moves_to_editing() {
        let h = analysis_harness(&[]);
        generated_room(&h).await;

        assert_eq!(h.workflow.generate_room().await.unwrap(), Completion::Applied);
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Editing);
        assert!(view.artifact.is_some());

        let requests = h.synthesizer.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].images.is_empty());
        assert!(requests[0].prompt.contains("reading nook"));
        assert!(requests[0].prompt.contains("#111"));
    }

    #[tokio::test]
    async fn test_failed_generation_keeps_profile_and_description() {
        let mut analyzer = FakeAnalyzer::default();
        analyzer
            .by_url
            .insert(record("1").image_url, description("#111", "oak", "calm"));
        let synthesizer = FakeSynthesizer {
            fail: true,
            ..Default::default()
        };
        let h = harness(FakeSearch::default(), FakeLoader::default(), analyzer, synthesizer);
        generated_room(&h).await;

        assert!(h.workflow.generate_room().await.is_err());
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Generating);
        assert!(view.profile.is_some());
        assert_eq!(view.room_description, "reading nook");
        assert_eq!(view.error.as_deref(), Some(MSG_GENERATE_FAILED));
    }

    #[tokio::test]
    async fn test_edit_pathway_loads_artifact_without_model_calls() {
        let h = default_harness();
        enter_search(&h.workflow, Pathway::Edit).await;
        select(&h.workflow, &["a"]).await;

        h.workflow.start_editing_from_selection().await.unwrap();
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Editing);
        assert_eq!(
            view.artifact.unwrap().data,
            record("a").image_url.into_bytes()
        );
        assert!(h.analyzer.calls.lock().unwrap().is_empty());
        assert!(h.synthesizer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_pathway_load_failure_stays_in_search() {
        let mut loader = FakeLoader::default();
        loader.failing.insert(record("a").image_url);
        let h = harness(
            FakeSearch::default(),
            loader,
            FakeAnalyzer::default(),
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::Edit).await;
        select(&h.workflow, &["a"]).await;

        assert!(h.workflow.start_editing_from_selection().await.is_err());
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Search);
        assert_eq!(view.error.as_deref(), Some(MSG_LOAD_FOR_EDIT_FAILED));
    }

    #[tokio::test]
    async fn test_repeated_edits_replace_artifact() {
        let h = default_harness();
        enter_search(&h.workflow, Pathway::Edit).await;
        select(&h.workflow, &["a"]).await;
        h.workflow.start_editing_from_selection().await.unwrap();

        let err = h.workflow.apply_edit().await.unwrap_err();
        assert!(matches!(err, DesignError::ValidationFailure(_)));

        h.workflow.set_edit_prompt("add a green velvet sofa").await.unwrap();
        h.workflow.apply_edit().await.unwrap();
        h.workflow.set_edit_prompt("warmer lighting").await.unwrap();
        h.workflow.apply_edit().await.unwrap();

        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Editing);
        assert_eq!(view.artifact.unwrap().data, vec![2]);
        assert!(view.edit_prompt.is_empty());

        let requests = h.synthesizer.requests.lock().unwrap().clone();
        assert_eq!(requests[1].images[0].data, vec![1]);
        assert!(requests[1].prompt.starts_with("Modify this image to: warmer lighting."));
    }

    #[tokio::test]
    async fn test_failed_edit_keeps_previous_artifact() {
        let synthesizer = FakeSynthesizer {
            fail: true,
            ..Default::default()
        };
        let h = harness(
            FakeSearch::default(),
            FakeLoader::default(),
            FakeAnalyzer::default(),
            synthesizer,
        );
        enter_search(&h.workflow, Pathway::Edit).await;
        select(&h.workflow, &["a"]).await;
        h.workflow.start_editing_from_selection().await.unwrap();
        let before = h.workflow.view().await.artifact;

        h.workflow.set_edit_prompt("remove the rug").await.unwrap();
        assert!(h.workflow.apply_edit().await.is_err());

        let view = h.workflow.view().await;
        assert_eq!(view.artifact, before);
        assert_eq!(view.edit_prompt, "remove the rug");
        assert_eq!(view.error.as_deref(), Some(MSG_EDIT_FAILED));
    }

    #[tokio::test]
    async fn test_virtual_try_on_sends_photo_then_inspirations() {
        let h = default_harness();
        enter_search(&h.workflow, Pathway::TryOn).await;
        select(&h.workflow, &["x", "y"]).await;
        h.workflow.proceed_to_try_on().await.unwrap();

        assert!(h.workflow.virtual_try_on().await.is_err());
        assert_eq!(h.workflow.view().await.error.as_deref(), Some(MSG_TRY_ON_REQUIRED));

        let photo = EncodedImage::new(vec![9, 9], "image/png");
        h.workflow.set_try_on_photo(photo.clone()).await.unwrap();
        h.workflow.set_try_on_prompt("wear the jacket from the pins").await.unwrap();
        assert_eq!(h.workflow.virtual_try_on().await.unwrap(), Completion::Applied);

        assert_eq!(h.workflow.state().await, AppState::Editing);
        let requests = h.synthesizer.requests.lock().unwrap().clone();
        let images = &requests[0].images;
        assert_eq!(images.len(), 3);
        assert_eq!(images[0], photo);
        assert_eq!(images[1].data, record("x").image_url.into_bytes());
        assert_eq!(images[2].data, record("y").image_url.into_bytes());
        assert_eq!(requests[0].prompt, "wear the jacket from the pins");
    }

    #[tokio::test]
    async fn test_try_on_fetch_failure_returns_to_setup() {
        let mut loader = FakeLoader::default();
        loader.failing.insert(record("y").image_url);
        let h = harness(
            FakeSearch::default(),
            loader,
            FakeAnalyzer::default(),
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::TryOn).await;
        select(&h.workflow, &["x", "y"]).await;
        h.workflow.proceed_to_try_on().await.unwrap();
        h.workflow
            .set_try_on_photo(EncodedImage::new(vec![1], "image/jpeg"))
            .await
            .unwrap();
        h.workflow.set_try_on_prompt("style me").await.unwrap();

        assert!(h.workflow.virtual_try_on().await.is_err());
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::TryOnSetup);
        assert_eq!(view.error.as_deref(), Some(MSG_TRY_ON_FAILED));
        assert!(view.artifact.is_none());
        assert_eq!(h.loader.loads.lock().unwrap().len(), 2);
        assert!(h.synthesizer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_over_clears_session() {
        let h = default_harness();
        enter_search(&h.workflow, Pathway::Edit).await;
        select(&h.workflow, &["a"]).await;
        h.workflow.start_editing_from_selection().await.unwrap();
        h.workflow.set_edit_prompt("half-typed").await.unwrap();

        h.workflow.start_over().await.unwrap();
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::PathwaySelection);
        assert!(view.pathway.is_none());
        assert!(view.selection.is_empty());
        assert!(view.profile.is_none());
        assert!(view.artifact.is_none());
        assert!(view.edit_prompt.is_empty());
        assert!(view.try_on_prompt.is_empty());
        assert!(view.room_description.is_empty());
        assert!(view.has_credentials);
    }

    #[tokio::test]
    async fn test_change_credentials_keeps_session_data() {
        let h = default_harness();
        enter_search(&h.workflow, Pathway::Generate).await;
        select(&h.workflow, &["a", "b"]).await;

        h.workflow.change_credentials().await.unwrap();
        assert_eq!(h.workflow.state().await, AppState::CredentialEntry);
        assert!(h.workflow.start_over().await.is_err());

        h.workflow.submit_credentials("sc-new", "gm-new").await.unwrap();
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::PathwaySelection);
        assert_eq!(ids(&view.selection), vec!["a", "b"]);

        h.workflow.choose_pathway(Pathway::Generate).await.unwrap();
        assert_eq!(ids(&h.workflow.view().await.selection), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_late_generation_result_is_discarded_after_start_over() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut analyzer = FakeAnalyzer::default();
        analyzer
            .by_url
            .insert(record("1").image_url, description("#111", "oak", "calm"));
        let h = harness(
            FakeSearch::default(),
            FakeLoader::default(),
            analyzer,
            FakeSynthesizer::gated(started.clone(), release.clone()),
        );
        generated_room(&h).await;

        let workflow = h.workflow.clone();
        let pending = tokio::spawn(async move { workflow.generate_room().await });

        started.notified().await;
        assert!(h.workflow.view().await.is_loading());
        h.workflow.start_over().await.unwrap();
        release.notify_one();

        let completion = pending.await.unwrap().unwrap();
        assert_eq!(completion, Completion::Superseded);

        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::PathwaySelection);
        assert!(view.artifact.is_none());
        assert!(view.profile.is_none());
        assert!(!view.is_loading());
    }

    #[test]
    fn test_workflow_rejects_out_of_range_selection_limit() {
        for limit in [0, 11] {
            let services = Services::new(
                Arc::new(FakeSearch::default()),
                Arc::new(FakeLoader::default()),
                Arc::new(FakeAnalyzer::default()),
                Arc::new(FakeSynthesizer::default()),
            );
            let config = Config::default().with_max_selections(limit);
            assert!(matches!(
                Workflow::new(services, &config),
                Err(DesignError::ValidationFailure(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_inputs_are_rejected_outside_their_step() {
        let h = default_harness();
        enter_search(&h.workflow, Pathway::TryOn).await;

        for result in [
            h.workflow.set_room_description("loft").await,
            h.workflow.set_edit_prompt("brighter").await,
            h.workflow.set_try_on_prompt("style me").await,
            h.workflow.clear_try_on_photo().await,
            h.workflow
                .set_try_on_photo(EncodedImage::new(vec![1], "image/png"))
                .await,
        ] {
            assert!(matches!(result, Err(DesignError::InvalidTransition { .. })));
        }
        h.workflow.set_search_query("boho bedroom").await.unwrap();

        let view = h.workflow.view().await;
        assert!(view.room_description.is_empty());
        assert!(view.edit_prompt.is_empty());
        assert!(view.try_on_prompt.is_empty());
        assert_eq!(view.search_query, "boho bedroom");
    }

    #[tokio::test]
    async fn test_late_search_result_is_discarded_after_reset() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let h = harness(
            FakeSearch::with(vec![SearchReply::Page(vec!["stale"], Some("next"))])
                .gated(started.clone(), release.clone()),
            FakeLoader::default(),
            FakeAnalyzer::default(),
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::Generate).await;

        let workflow = h.workflow.clone();
        let pending = tokio::spawn(async move { workflow.search().await });

        started.notified().await;
        h.workflow.reset_search().await.unwrap();
        release.notify_one();

        assert_eq!(pending.await.unwrap().unwrap(), Completion::Superseded);
        let view = h.workflow.view().await;
        assert!(view.results.is_empty());
        assert!(!view.has_more_results);
        assert!(!view.is_loading());
    }

    #[tokio::test]
    async fn test_start_over_stops_batch_analysis() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut analyzer = FakeAnalyzer {
            gate: Some((started.clone(), release.clone())),
            ..Default::default()
        };
        for id in ["1", "2", "3"] {
            analyzer
                .by_url
                .insert(record(id).image_url, description("#111", "oak", "calm"));
        }
        let h = harness(
            FakeSearch::default(),
            FakeLoader::default(),
            analyzer,
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::Generate).await;
        select(&h.workflow, &["1", "2", "3"]).await;

        let workflow = h.workflow.clone();
        let pending = tokio::spawn(async move { workflow.analyze_taste().await });

        started.notified().await;
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Analyzing);
        assert_eq!(view.loading.as_deref(), Some("Analyzing 1/3 pins..."));
        assert_eq!(
            view.progress,
            Some(Progress {
                completed: 0,
                total: 3
            })
        );

        h.workflow.start_over().await.unwrap();
        release.notify_one();

        assert_eq!(pending.await.unwrap().unwrap(), Completion::Superseded);
        assert_eq!(h.analyzer.calls.lock().unwrap().len(), 1);

        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::PathwaySelection);
        assert!(view.profile.is_none());
        assert!(view.progress.is_none());
    }

    #[tokio::test]
    async fn test_progress_counts_analyzed_pins() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut analyzer = FakeAnalyzer {
            gate: Some((started.clone(), release.clone())),
            ..Default::default()
        };
        for id in ["1", "2"] {
            analyzer
                .by_url
                .insert(record(id).image_url, description("#222", "linen", "airy"));
        }
        let h = harness(
            FakeSearch::default(),
            FakeLoader::default(),
            analyzer,
            FakeSynthesizer::default(),
        );
        enter_search(&h.workflow, Pathway::Generate).await;
        select(&h.workflow, &["1", "2"]).await;

        let workflow = h.workflow.clone();
        let pending = tokio::spawn(async move { workflow.analyze_taste().await });

        started.notified().await;
        assert_eq!(
            h.workflow.view().await.loading.as_deref(),
            Some("Analyzing 1/2 pins...")
        );
        release.notify_one();

        started.notified().await;
        let view = h.workflow.view().await;
        assert_eq!(view.loading.as_deref(), Some("Analyzing 2/2 pins..."));
        assert_eq!(
            view.progress,
            Some(Progress {
                completed: 1,
                total: 2
            })
        );
        release.notify_one();

        assert_eq!(pending.await.unwrap().unwrap(), Completion::Applied);
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::Generating);
        assert!(view.progress.is_none());
    }

    #[tokio::test]
    async fn test_change_credentials_orphans_pending_edit() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let h = harness(
            FakeSearch::default(),
            FakeLoader::default(),
            FakeAnalyzer::default(),
            FakeSynthesizer::gated(started.clone(), release.clone()),
        );
        enter_search(&h.workflow, Pathway::Edit).await;
        select(&h.workflow, &["a"]).await;
        h.workflow.start_editing_from_selection().await.unwrap();
        let before = h.workflow.view().await.artifact;
        h.workflow.set_edit_prompt("add plants").await.unwrap();

        let workflow = h.workflow.clone();
        let pending = tokio::spawn(async move { workflow.apply_edit().await });

        started.notified().await;
        h.workflow.change_credentials().await.unwrap();
        release.notify_one();

        assert_eq!(pending.await.unwrap().unwrap(), Completion::Superseded);
        let view = h.workflow.view().await;
        assert_eq!(view.state, AppState::CredentialEntry);
        assert_eq!(view.artifact, before);
        assert_eq!(view.edit_prompt, "add plants");
        assert!(!view.is_loading());
    }
}
