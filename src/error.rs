//! Crate-wide error type.
//!
//! Only request-level failures live here. Conditions the pipeline treats as
//! normal outcomes (no matches, a cover whose feature vanished, tmpid ordinal
//! wrap-around, address candidates past the cap) never surface as errors.

/// Errors raised while building sources or serving a geocode request.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("phrase lookup failed: {0}")]
    PhraseLookup(String),

    #[error("storage error in source '{source_name}': {reason}")]
    Storage { source_name: String, reason: String },

    #[error("invalid replacement rule '{pattern}': {error}")]
    InvalidReplacement {
        pattern: String,
        #[source]
        error: regex::Error,
    },

    #[error("feature id {id} is outside 1..={max}")]
    FeatureIdOutOfRange { id: u32, max: u32 },

    #[error("duplicate feature id {id} while merging into '{source_name}'")]
    MergeConflict { source_name: String, id: u32 },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = GeocodeError> = std::result::Result<T, E>;
