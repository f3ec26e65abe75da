//! Fuzzy Match Adapter.
//!
//! The matcher only depends on the [`PhraseLookup`] capability: given phrase
//! windows, return the dictionary phrases they match together with an edit
//! distance and the ending type the match was made under. How the dictionary
//! is stored is the adapter's business.
//!
//! [`MemoryPhraseSet`] is the in-memory adapter used by
//! [`MemorySource`](crate::source::MemorySource). It keeps phrases in a sorted
//! set so prefix lookups are a single range scan:
//!
//! ```text
//! ["the","quick"]          <- query (AnyPrefix)
//! ["the","quick","brown"]  <- first entry >= query, shares the prefix: hit
//! ["the","quicker"]        <- also in the prefix block
//! ["the","r..."]           <- first entry past the block, scan stops
//! ```

use crate::error::Result;
use crate::text::is_numeric;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Words shorter than this must match exactly even when fuzzy matching is on.
const MIN_FUZZY_WORD_LEN: usize = 4;

/// How the last word of a phrase may relate to a dictionary phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum EndingType {
    /// The phrase must match a dictionary phrase exactly.
    #[default]
    NonPrefix = 0,
    /// The last word may be an incomplete prefix and more words may follow.
    AnyPrefix = 1,
    /// More words may follow but the last word must be complete.
    WordBoundaryPrefix = 2,
}

impl EndingType {
    pub fn is_prefix(self) -> bool {
        self != EndingType::NonPrefix
    }
}

/// One dictionary hit for a phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyMatch {
    /// The dictionary words matched, one per query word.
    pub phrase: Vec<String>,
    pub edit_distance: u8,
    pub ending_type: EndingType,
}

/// A dictionary hit for the window starting at `start_position`.
///
/// The window covers `phrase.len()` tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyWindowMatch {
    pub start_position: usize,
    pub phrase: Vec<String>,
    pub edit_distance: u8,
    pub ending_type: EndingType,
}

/// Read-only phrase dictionary capability. Safe for concurrent readers.
pub trait PhraseLookup: Send + Sync {
    /// Whether `phrase` is in the dictionary under `ending_type` semantics.
    fn contains(&self, phrase: &[String], ending_type: EndingType) -> Result<bool>;

    /// Match a single phrase.
    fn fuzzy_match(
        &self,
        phrase: &[String],
        max_word_dist: u8,
        max_phrase_dist: u8,
        ending_type: EndingType,
    ) -> Result<Vec<FuzzyMatch>>;

    /// Match every contiguous window of `tokens`. Only windows reaching the last
    /// token use `ending_type`; the rest are matched as `NonPrefix`.
    fn fuzzy_match_windows(
        &self,
        tokens: &[String],
        max_word_dist: u8,
        max_phrase_dist: u8,
        ending_type: EndingType,
    ) -> Result<Vec<FuzzyWindowMatch>> {
        let mut out = Vec::new();
        for start in 0..tokens.len() {
            for end in (start + 1..=tokens.len()).rev() {
                let ending = if end == tokens.len() { ending_type } else { EndingType::NonPrefix };
                for m in self.fuzzy_match(&tokens[start..end], max_word_dist, max_phrase_dist, ending)? {
                    out.push(FuzzyWindowMatch {
                        start_position: start,
                        phrase: m.phrase,
                        edit_distance: m.edit_distance,
                        ending_type: m.ending_type,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Match many independent phrases in one call. The result is aligned with `groups`.
    fn fuzzy_match_multi(
        &self,
        groups: &[(Vec<String>, EndingType)],
        max_word_dist: u8,
        max_phrase_dist: u8,
    ) -> Result<Vec<Vec<FuzzyMatch>>> {
        groups
            .iter()
            .map(|(phrase, ending)| self.fuzzy_match(phrase, max_word_dist, max_phrase_dist, *ending))
            .collect()
    }
}

/// Accumulates phrases, then freezes them into a [`MemoryPhraseSet`].
#[derive(Debug, Default)]
pub struct MemoryPhraseSetBuilder {
    phrases: BTreeSet<Vec<String>>,
}

impl MemoryPhraseSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: AsRef<str>>(&mut self, phrase: &[S]) {
        if phrase.is_empty() {
            return;
        }
        self.phrases.insert(phrase.iter().map(|w| w.as_ref().to_string()).collect());
    }

    pub fn finish(self) -> MemoryPhraseSet {
        let mut by_len: HashMap<usize, Vec<Vec<String>>> = HashMap::new();
        for phrase in &self.phrases {
            by_len.entry(phrase.len()).or_default().push(phrase.clone());
        }
        MemoryPhraseSet { phrases: self.phrases, by_len }
    }
}

/// Immutable in-memory phrase dictionary.
#[derive(Debug, Clone, Default)]
pub struct MemoryPhraseSet {
    phrases: BTreeSet<Vec<String>>,
    by_len: HashMap<usize, Vec<Vec<String>>>,
}

impl MemoryPhraseSet {
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<String>> {
        self.phrases.iter()
    }

    fn contains_prefix(&self, phrase: &[String], word_boundary: bool) -> bool {
        let Some((last, head)) = phrase.split_last() else {
            return false;
        };
        self.phrases
            .range(phrase.to_vec()..)
            .take_while(|p| p.len() >= phrase.len() && p[..head.len()] == *head && p[head.len()].starts_with(last))
            .any(|p| !word_boundary || p[head.len()] == *last)
    }

    fn word_distance(query: &str, candidate: &str) -> Option<usize> {
        if query == candidate {
            return Some(0);
        }
        if query.chars().count() < MIN_FUZZY_WORD_LEN || is_numeric(query) {
            return None;
        }
        Some(strsim::levenshtein(query, candidate))
    }
}

impl PhraseLookup for MemoryPhraseSet {
    fn contains(&self, phrase: &[String], ending_type: EndingType) -> Result<bool> {
        Ok(match ending_type {
            EndingType::NonPrefix => self.phrases.contains(phrase),
            EndingType::AnyPrefix => self.contains_prefix(phrase, false),
            EndingType::WordBoundaryPrefix => self.contains_prefix(phrase, true),
        })
    }

    fn fuzzy_match(
        &self,
        phrase: &[String],
        max_word_dist: u8,
        max_phrase_dist: u8,
        ending_type: EndingType,
    ) -> Result<Vec<FuzzyMatch>> {
        if phrase.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        if ending_type.is_prefix() && self.contains(phrase, ending_type)? {
            out.push(FuzzyMatch { phrase: phrase.to_vec(), edit_distance: 0, ending_type });
        } else if self.phrases.contains(phrase) {
            out.push(FuzzyMatch { phrase: phrase.to_vec(), edit_distance: 0, ending_type: EndingType::NonPrefix });
        }

        if max_phrase_dist == 0 || max_word_dist == 0 {
            return Ok(out);
        }

        let candidates = self.by_len.get(&phrase.len()).map(Vec::as_slice).unwrap_or_default();
        for candidate in candidates {
            let mut total = 0usize;
            let within = phrase.iter().zip(candidate).all(|(q, c)| match Self::word_distance(q, c) {
                Some(d) if d <= max_word_dist as usize => {
                    total += d;
                    true
                }
                _ => false,
            });
            if within && total > 0 && total <= max_phrase_dist as usize {
                out.push(FuzzyMatch {
                    phrase: candidate.clone(),
                    edit_distance: total as u8,
                    ending_type: EndingType::NonPrefix,
                });
            }
        }

        out.sort_by(|a, b| a.edit_distance.cmp(&b.edit_distance).then_with(|| a.phrase.cmp(&b.phrase)));
        Ok(out)
    }
}
