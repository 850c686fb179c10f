//! Folds per-image analyses into a single taste profile.

use std::collections::HashMap;

use crate::error::{DesignError, Result};
use crate::models::{AestheticDescription, TasteProfile};

pub const TOP_COLORS: usize = 5;
pub const TOP_TEXTURES: usize = 5;
pub const TOP_MOODS: usize = 2;

/// Occurrence counts that remember first-seen order.
#[derive(Debug, Default)]
struct Tally {
    index: HashMap<String, usize>,
    entries: Vec<(String, usize)>,
}

impl Tally {
    fn add(&mut self, item: &str) {
        match self.index.get(item) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(item.to_string(), self.entries.len());
                self.entries.push((item.to_string(), 1));
            }
        }
    }

    fn top(mut self, limit: usize) -> Vec<String> {
        // sort_by is stable, so equal counts keep first-seen order
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries
            .into_iter()
            .take(limit)
            .map(|(item, _)| item)
            .collect()
    }
}

pub fn synthesize_profile(analyses: &[AestheticDescription]) -> Result<TasteProfile> {
    if analyses.is_empty() {
        return Err(DesignError::NoSuccessfulAnalyses);
    }

    let mut colors = Tally::default();
    let mut textures = Tally::default();
    let mut moods = Tally::default();

    for analysis in analyses {
        for color in &analysis.palette {
            colors.add(color);
        }
        for material in &analysis.materials {
            textures.add(material);
        }
        moods.add(&analysis.mood);
    }

    let profile = TasteProfile {
        colors: colors.top(TOP_COLORS),
        textures: textures.top(TOP_TEXTURES),
        moods: moods.top(TOP_MOODS),
    };
    log::debug!(
        "Synthesized profile from {} analyses: {:?}",
        analyses.len(),
        profile
    );
    Ok(profile)
}
