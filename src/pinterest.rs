use crate::{
    config::SearchConfig,
    error::{DesignError, Result},
    models::{PinterestSearchResponse, SearchPage},
    services::PinSearch,
};
use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode};

/// Scrape Creators Pinterest search client.
#[derive(Clone)]
pub struct PinterestClient {
    client: Client,
    base_url: String,
}

impl PinterestClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("design-irl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn build_request(&self, api_key: &str, query: &str, cursor: Option<&str>) -> Result<Request> {
        let mut params = vec![("query", query), ("trim", "true")];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let request = self
            .client
            .get(&self.base_url)
            .query(&params)
            .header("x-api-key", api_key)
            .build()?;
        Ok(request)
    }

    pub async fn search_pins(
        &self,
        api_key: &str,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        if api_key.trim().is_empty() {
            return Err(DesignError::CredentialMissing(
                "Scrape Creators API key is required".into(),
            ));
        }

        log::info!(
            "Searching pins for {:?}{}",
            query,
            if cursor.is_some() { " (next page)" } else { "" }
        );

        let request = self.build_request(api_key, query, cursor)?;
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| DesignError::FetchFailure(format!("Failed to fetch pins: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("Pin search returned {}: {}", status, body);
            return Err(classify_status(status));
        }

        let payload: PinterestSearchResponse = response
            .json()
            .await
            .map_err(|e| DesignError::FetchFailure(format!("Failed to read pins: {}", e)))?;
        let page = SearchPage::from(payload);

        log::debug!(
            "Received {} pins, more pages: {}",
            page.items.len(),
            page.has_more()
        );
        Ok(page)
    }
}

fn classify_status(status: StatusCode) -> DesignError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DesignError::CredentialInvalid(format!("search backend answered {}", status))
        }
        _ => DesignError::FetchFailure(format!(
            "Failed to fetch pins: {}",
            status.canonical_reason().unwrap_or(status.as_str())
        )),
    }
}

#[async_trait]
impl PinSearch for PinterestClient {
    async fn search(
        &self,
        api_key: &str,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        self.search_pins(api_key, query, cursor).await
    }
}
