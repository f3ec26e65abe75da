//! Query-time core of a multi-source forward geocoder.
//!
//! A [`Geocoder`] holds an ordered list of independently indexed sources
//! (country, region, place, address, ...). A query is matched against every
//! source, per-source hits are stacked into whole-query spatial matches, and
//! the best stacks are verified against stored features and ranked.
//!
//! ```no_run
//! use tessera::{GeocoderDefinition, Options};
//!
//! let geocoder = GeocoderDefinition::from_path("index.json")?.build()?;
//! let response = geocoder.geocode("100 main street", &Options::default())?;
//! for feature in &response.features {
//!     println!("{} ({:.2})", feature.place_name, feature.relevance);
//! }
//! # Ok::<(), tessera::GeocodeError>(())
//! ```

#[macro_use]
mod macros;
mod api;
pub mod cache;
pub mod config;
pub mod engine;
mod error;
pub mod feature;
pub mod fuzzy;
mod geocoder;
pub mod source;
pub mod text;

use serde::Serialize;

pub use api::{ContextEntry, DebugInfo, GeocodeResponse, Options, ResponseFeature, SourcePhrasematches};
pub use config::{GeocoderDefinition, ReplacementRule, SourceConfig, SourceFlags};
pub use engine::{GeocodeMetrics, TmpId};
pub use error::{GeocodeError, Result};
pub use feature::{Feature, Geometry, Properties};
pub use fuzzy::{EndingType, PhraseLookup};
pub use geocoder::Geocoder;
pub use source::{MemorySource, Source, SourceView};

// --- Query-scoped records ----------------------------------------------------

/// A contiguous run of query tokens handed to the phrase dictionary.
///
/// `tokens` may hold a numeric class (`1##`) in place of a literal number.
/// `mask` is over original token positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhraseWindow {
    pub tokens: Vec<String>,
    pub mask: u32,
    /// Window reaches the last query token, so prefix matching is allowed.
    pub ender: bool,
    pub ending_type: EndingType,
}

/// A dictionary hit for part of the query in one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phrasematch {
    /// Matched dictionary words joined by a space; also the grid key.
    pub phrase: String,
    pub mask: u32,
    /// Share of original query tokens covered by `mask`.
    pub weight: f64,
    pub edit_distance: u8,
    pub ending_type: EndingType,
}

impl Phrasematch {
    pub fn prefix(&self) -> bool {
        self.ending_type.is_prefix()
    }
}

/// One (feature, tile) candidate surfaced by a source for a phrasematch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cover {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
    pub id: u32,
    /// Position of the source in the geocoder. Not truncated, unlike the
    /// ordinal packed into `tmpid`.
    pub ordinal: usize,
    pub tmpid: TmpId,
    pub mask: u32,
    pub relev: f64,
    /// Kilometers to the proximity point, when one was given.
    pub distance: Option<f64>,
    pub score: f64,
    pub scoredist: f64,
    pub matches_language: bool,
    pub prefix: bool,
    pub text: String,
}

/// Covers from distinct sources whose masks do not overlap, most specific
/// source first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spatialmatch {
    pub relev: f64,
    pub covers: Vec<Cover>,
}

impl Spatialmatch {
    pub fn head(&self) -> Option<&Cover> {
        self.covers.first()
    }

    /// Union of the member masks.
    pub fn mask(&self) -> u32 {
        self.covers.iter().fold(0, |acc, c| acc | c.mask)
    }
}
