//! User selection over the visible result set
//!
//! Owned by the session actor; nothing else mutates it.

use crate::models::{ImageId, ImageRecord};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionStore {
    selected: BTreeSet<ImageId>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` if absent, remove it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, id: ImageId) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    /// Select every record in `results`; never deselects. Returns how many were added.
    pub fn select_all(&mut self, results: &[ImageRecord]) -> usize {
        results
            .iter()
            .filter(|record| self.selected.insert(record.id))
            .count()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drop ids no longer present in `results`
    pub fn retain_present(&mut self, results: &[ImageRecord]) {
        let present: BTreeSet<ImageId> = results.iter().map(|r| r.id).collect();
        self.selected.retain(|id| present.contains(id));
    }

    pub fn remove_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a ImageId>) {
        for id in ids {
            self.selected.remove(id);
        }
    }

    /// Selected records among `results`, in result order
    pub fn selected_in(&self, results: &[ImageRecord]) -> Vec<ImageRecord> {
        results
            .iter()
            .filter(|record| self.selected.contains(&record.id))
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.selected.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> &BTreeSet<ImageId> {
        &self.selected
    }
}
