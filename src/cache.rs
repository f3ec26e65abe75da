//! Grid read cache.
//!
//! Keys carry the index generation, so a flushed source never serves stale
//! postings. [`GridCache::reset`] drops everything; tests call it between
//! independent runs.

use crate::error::Result;
use crate::fuzzy::EndingType;
use crate::source::{GridEntry, SourceView};
use moka::sync::Cache;
use std::sync::Arc;

const DEFAULT_CAPACITY: u64 = 16_384;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GridKey {
    ordinal: usize,
    generation: u64,
    phrase: String,
    ending_type: EndingType,
}

pub struct GridCache {
    cache: Cache<GridKey, Arc<Vec<GridEntry>>>,
}

impl Default for GridCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl GridCache {
    pub fn new(max_entries: u64) -> Self {
        Self { cache: Cache::builder().max_capacity(max_entries).build() }
    }

    /// Postings for `phrase` in the source at `ordinal`, read through `view` on a miss.
    pub fn grid(
        &self,
        ordinal: usize,
        view: &dyn SourceView,
        phrase: &str,
        ending_type: EndingType,
    ) -> Result<Arc<Vec<GridEntry>>> {
        let key = GridKey { ordinal, generation: view.generation(), phrase: phrase.to_string(), ending_type };
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let postings = Arc::new(view.grid(phrase, ending_type)?);
        self.cache.insert(key, postings.clone());
        Ok(postings)
    }

    pub fn reset(&self) {
        self.cache.invalidate_all();
    }
}
