//! Query-time matching engine.
//!
//! This module is the entry point for everything between a tokenized query
//! and an ordered list of contexts. It is split into focused submodules under
//! `src/engine/`, while keeping public paths stable (for example
//! `crate::engine::TmpId` and `crate::engine::phrasematch`).
//!
//! ## How the parts work together
//!
//! A forward geocode is a pipeline, fanned out per source up to the stacking
//! barrier:
//!
//! ```text
//! query ── tokenize + Replacer::apply ──┐  (text.rs)
//!                                       │   per source, in parallel
//!                                       v
//!                     phrasematch (phrasematch.rs)
//!                       - windows over the query (mask.rs)
//!                       - numeric-class variants for address sources
//!                       - one fuzzy lookup call per source
//!                                       │
//!                                       v
//!                     covers_for (spatialmatch.rs)
//!                       - grid reads through GridCache
//!                       - tmpid packing (tmpid.rs)
//!                                       │  barrier: all sources done
//!                                       v
//!                     stack (spatialmatch.rs)
//!                       - disjoint masks, aligned tiles
//!                                       │
//!                                       v
//!                     verify_features (verifymatch.rs)
//!                       - feature lookup by (ordinal, id)
//!                       - address numbers, parent containment
//!                       - sort_feature (ranking.rs)
//!                                       │
//!                                       v
//!                     dedupe (dedup.rs) ── build_context (context.rs)
//!                                       │
//!                                       v
//!                          sort_context (ranking.rs)
//!                                       │
//!                                       v
//!                               Vec<Context>
//! ```
//!
//! ## Responsibilities by module
//!
//! - `mask.rs`: bitmask helpers over token positions; required masks from an
//!   owner mapping.
//! - `tmpid.rs`: packs `(ordinal, feature id)` into 32 bits.
//! - `phrasematch.rs`: phrase windows and their lookup against one source.
//! - `spatialmatch.rs`: covers, proximity scoring and stacking.
//! - `verifymatch.rs`: covers back to features, address disambiguation.
//! - `ranking.rs`: the total orders over features and contexts.
//! - `dedup.rs`: drops results that read the same.
//! - `context.rs`: hierarchy fill and reverse geocoding.
//! - `metrics.rs`: per-stage timings and counts.
//!
//! The orchestration itself lives in [`Geocoder`](crate::Geocoder).

#[path = "engine/context.rs"]
pub mod context;
#[path = "engine/dedup.rs"]
pub mod dedup;
#[path = "engine/mask.rs"]
pub mod mask;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/phrasematch.rs"]
pub mod phrasematch;
#[path = "engine/ranking.rs"]
pub mod ranking;
#[path = "engine/spatialmatch.rs"]
pub mod spatialmatch;
#[path = "engine/tmpid.rs"]
mod tmpid;
#[path = "engine/verifymatch.rs"]
pub mod verifymatch;

pub use context::{Context, ContextMember};
pub use metrics::{GeocodeMetrics, StageCounts};
pub use phrasematch::FuzzyParams;
pub use spatialmatch::{CoverOptions, PROXIMITY_WEIGHT};
pub use tmpid::{FEATURE_ID_BITS, FEATURE_ID_MASK, MAX_SOURCES, ORDINAL_BITS, TmpId};
pub use verifymatch::{FeatureLookup, MAX_ADDRESS_INSTANCES, VerifiedFeature, VerifiedParent};
