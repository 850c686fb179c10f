use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
}

impl ImageRecord {
    pub fn new(id: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            image_url: image_url.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub items: Vec<ImageRecord>,
    /// `None` when the backend has no further pages.
    pub continuation_token: Option<String>,
}

impl SearchPage {
    pub fn has_more(&self) -> bool {
        self.continuation_token.is_some()
    }
}

// Wire format of the Scrape Creators Pinterest search endpoint.

#[derive(Debug, Deserialize)]
pub struct PinterestSearchResponse {
    #[serde(default)]
    pub pins: Option<Vec<PinterestPin>>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PinterestPin {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Option<PinterestImages>,
}

#[derive(Debug, Deserialize)]
pub struct PinterestImages {
    pub orig: Option<PinterestImage>,
}

#[derive(Debug, Deserialize)]
pub struct PinterestImage {
    pub url: String,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected pin id, got {}",
            other
        ))),
    }
}

impl PinterestPin {
    /// Pins without an original-size image cannot be analyzed and are dropped.
    pub fn into_record(self) -> Option<ImageRecord> {
        let url = self.images?.orig?.url;
        if url.is_empty() {
            return None;
        }
        Some(ImageRecord {
            id: self.id,
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            image_url: url,
        })
    }
}

impl From<PinterestSearchResponse> for SearchPage {
    fn from(response: PinterestSearchResponse) -> Self {
        let items = response
            .pins
            .unwrap_or_default()
            .into_iter()
            .filter_map(PinterestPin::into_record)
            .collect();
        let continuation_token = response.cursor.filter(|c| !c.is_empty());
        SearchPage {
            items,
            continuation_token,
        }
    }
}
