use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::entities::Description;

/// Process-lifetime cache of vision descriptions keyed by the source
/// image's content digest. Nothing is persisted across runs of the binary.
#[derive(Debug, Default)]
pub struct DescriptionCache {
    entries: Mutex<HashMap<String, Description>>,
}

impl DescriptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, digest: &str) -> Option<Description> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.get(digest).cloned()
    }

    pub fn store(&self, digest: &str, description: Description) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(digest.to_string(), description);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
