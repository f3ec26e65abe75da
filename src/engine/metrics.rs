//! Geocode run metrics.
//!
//! Every call to [`Geocoder::geocode`](crate::Geocoder::geocode) times its
//! stages. The numbers are reported in debug responses and by the CLI; they
//! are cheap enough to collect unconditionally.

use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct GeocodeMetrics {
    /// Wall time of the whole call.
    pub total: Duration,
    /// Phrase lookups across all sources, including cover construction.
    pub phrasematch: Duration,
    pub spatialmatch: Duration,
    pub verifymatch: Duration,
    /// Context assembly, ranking and response building.
    pub context: Duration,
    pub counts: StageCounts,
}

/// How much each stage produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub tokens: usize,
    pub phrasematches: usize,
    pub covers: usize,
    pub spatialmatches: usize,
    pub verified: usize,
    /// Verified features left after deduplication.
    pub deduped: usize,
}
