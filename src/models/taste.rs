use serde::{Deserialize, Serialize};

pub const PALETTE_SIZE: usize = 3;

/// What the vision model reports for a single image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AestheticDescription {
    pub palette: Vec<String>,
    pub materials: Vec<String>,
    pub layout: String,
    pub mood: String,
}

impl AestheticDescription {
    pub fn new(
        palette: impl IntoIterator<Item = impl Into<String>>,
        materials: impl IntoIterator<Item = impl Into<String>>,
        layout: impl Into<String>,
        mood: impl Into<String>,
    ) -> Self {
        Self {
            palette: palette.into_iter().map(Into::into).collect(),
            materials: materials.into_iter().map(Into::into).collect(),
            layout: layout.into(),
            mood: mood.into(),
        }
        .normalized()
    }

    /// Caps the palette at three colors.
    pub fn normalized(mut self) -> Self {
        self.palette.truncate(PALETTE_SIZE);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub colors: Vec<String>,
    pub textures: Vec<String>,
    pub moods: Vec<String>,
}
