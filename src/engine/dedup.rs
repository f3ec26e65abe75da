//! Deduplication of verified features.
//!
//! Several sources (or several covers of one source) can verify into results a
//! user would read as the same place. Verified features arrive in
//! [`sort_feature`](super::ranking::sort_feature) order, so keeping the first
//! feature per key keeps the best-ranked duplicate.
//!
//! ## What counts as "the same result"
//!
//! - Type of the source the feature came from
//! - Display text, lowercased
//! - Matched house number
//! - The tmpids of the verified parents, in stack order
//!
//! Parents are part of the key: "Springfield, Illinois" and "Springfield,
//! Missouri" are different results even though their heads read the same.
//! The instance position of an address is not: a house number repeated along
//! one street under one context chain is a single result.

use super::TmpId;
use super::verifymatch::{FeatureLookup, VerifiedFeature};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct DedupKey {
    pub(crate) type_name: String,
    pub(crate) text: String,
    pub(crate) address: Option<String>,
    pub(crate) parents: Vec<TmpId>,
}

impl DedupKey {
    pub(crate) fn from_verified(verified: &VerifiedFeature, lookup: &dyn FeatureLookup) -> Self {
        let props = &verified.feature.properties;
        DedupKey {
            type_name: lookup.source_config(verified.ordinal).map(|c| c.type_name().to_string()).unwrap_or_default(),
            text: verified.feature.display_text().to_lowercase(),
            address: props.address.clone(),
            parents: verified.parents.iter().map(|p| p.tmpid).collect(),
        }
    }
}

/// Keep the first feature of every [`DedupKey`]; order is preserved.
pub fn dedupe(verified: Vec<VerifiedFeature>, lookup: &dyn FeatureLookup) -> Vec<VerifiedFeature> {
    let before = verified.len();
    let mut seen = HashSet::new();
    let out: Vec<_> = verified.into_iter().filter(|v| seen.insert(DedupKey::from_verified(v, lookup))).collect();
    if out.len() < before {
        tracing::trace!(removed = before - out.len(), "deduplicated verified features");
    }
    out
}
