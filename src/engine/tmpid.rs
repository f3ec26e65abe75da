//! Packed (source ordinal, feature id) identifiers.
//!
//! ```text
//!  31        24 23                          0
//! ┌────────────┬─────────────────────────────┐
//! │  ordinal   │         feature id          │
//! └────────────┴─────────────────────────────┘
//! ```
//!
//! Encoding never range-checks. An ordinal of 256 or more wraps modulo 256
//! and collides with an existing source's identifier space; geocoders with
//! more than 256 sources keep working but their tmpids are ambiguous.
//! Anything that needs to find the feature again goes through the cover's
//! untruncated ordinal instead.

use serde::Serialize;
use std::fmt;

pub const ORDINAL_BITS: u32 = 8;
pub const FEATURE_ID_BITS: u32 = 24;
pub const FEATURE_ID_MASK: u32 = (1 << FEATURE_ID_BITS) - 1;
/// Sources addressable without tmpid collisions.
pub const MAX_SOURCES: usize = 1 << ORDINAL_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TmpId(u32);

impl TmpId {
    pub fn encode(ordinal: usize, feature_id: u32) -> Self {
        let ordinal = (ordinal as u32) & ((1 << ORDINAL_BITS) - 1);
        TmpId((ordinal << FEATURE_ID_BITS) | (feature_id & FEATURE_ID_MASK))
    }

    pub fn decode(self) -> (u8, u32) {
        ((self.0 >> FEATURE_ID_BITS) as u8, self.0 & FEATURE_ID_MASK)
    }

    pub fn ordinal(self) -> u8 {
        self.decode().0
    }

    pub fn feature_id(self) -> u32 {
        self.decode().1
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for TmpId {
    fn from(raw: u32) -> Self {
        TmpId(raw)
    }
}

impl From<TmpId> for u32 {
    fn from(id: TmpId) -> Self {
        id.0
    }
}

impl fmt::Display for TmpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
