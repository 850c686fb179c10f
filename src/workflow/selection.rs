use crate::models::ImageRecord;

/// Ordered, id-unique set of chosen images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<ImageRecord>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the record if present, otherwise appends it while below `bound`.
    /// Returns whether the selection changed.
    pub fn toggle(&mut self, record: &ImageRecord, bound: usize) -> bool {
        if let Some(pos) = self.position(&record.id) {
            self.items.remove(pos);
            return true;
        }
        if self.items.len() < bound {
            self.items.push(record.clone());
            return true;
        }
        false
    }

    /// Radio-button semantics: the record becomes the only member.
    pub fn select_only(&mut self, record: &ImageRecord) {
        self.items.clear();
        self.items.push(record.clone());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn items(&self) -> &[ImageRecord] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
