//! Source configuration.
//!
//! Every configured source carries its own capability flags and text
//! replacement rules. These are passed explicitly into the phrase generator
//! instead of being read off shared state.

use crate::error::Result;
use crate::feature::Feature;
use crate::geocoder::Geocoder;
use crate::source::{MemorySource, Source};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_MAXZOOM: u8 = 6;

bitflags::bitflags! {
    /// Per-source capabilities that change how queries are matched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SourceFlags: u8 {
        /// Source holds address features; numeric tokens get numeric-class variants
        /// and verified results are disambiguated by house number.
        const ADDRESS        = 1 << 0;
        /// Source text is valid in every language.
        const UNIVERSAL_TEXT = 1 << 1;
    }
}

/// A token-level text substitution, e.g. collapsing `hermanstrasse` into
/// `herman str`. `from` is a regex matched against a whole token; `to` may
/// reference capture groups (`$1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRule {
    pub from: String,
    pub to: String,
}

impl ReplacementRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

/// Configuration of one independently indexed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source name within a geocoder (e.g. `"country0"`).
    pub name: String,
    /// Feature type shared by sources of the same kind (e.g. `"country"`).
    /// Falls back to `name`.
    #[serde(default)]
    pub geocoder_name: Option<String>,
    #[serde(default = "default_maxzoom")]
    pub maxzoom: u8,
    #[serde(default)]
    pub geocoder_address: bool,
    #[serde(default)]
    pub geocoder_universal_text: bool,
    #[serde(default)]
    pub geocoder_languages: Vec<String>,
    #[serde(default)]
    pub replacements: Vec<ReplacementRule>,
}

fn default_maxzoom() -> u8 {
    DEFAULT_MAXZOOM
}

impl SourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            geocoder_name: None,
            maxzoom: DEFAULT_MAXZOOM,
            geocoder_address: false,
            geocoder_universal_text: false,
            geocoder_languages: Vec::new(),
            replacements: Vec::new(),
        }
    }

    pub fn with_type(mut self, geocoder_name: impl Into<String>) -> Self {
        self.geocoder_name = Some(geocoder_name.into());
        self
    }

    pub fn with_address(mut self) -> Self {
        self.geocoder_address = true;
        self
    }

    pub fn with_replacement(mut self, rule: ReplacementRule) -> Self {
        self.replacements.push(rule);
        self
    }

    /// Feature type of this source.
    pub fn type_name(&self) -> &str {
        self.geocoder_name.as_deref().unwrap_or(&self.name)
    }

    pub fn flags(&self) -> SourceFlags {
        let mut flags = SourceFlags::empty();
        if self.geocoder_address {
            flags |= SourceFlags::ADDRESS;
        }
        if self.geocoder_universal_text {
            flags |= SourceFlags::UNIVERSAL_TEXT;
        }
        flags
    }

    /// Whether results from this source count as matching `language`.
    pub fn matches_language(&self, language: Option<&str>) -> bool {
        match language {
            None => true,
            Some(_) if self.flags().contains(SourceFlags::UNIVERSAL_TEXT) => true,
            Some(lang) => self.geocoder_languages.iter().any(|l| l == lang),
        }
    }
}

/// One source of a [`GeocoderDefinition`]: its config and the features to index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    #[serde(flatten)]
    pub config: SourceConfig,
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// JSON description of a whole geocoder. Source order is ordinal order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderDefinition {
    pub sources: Vec<SourceDefinition>,
}

impl GeocoderDefinition {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Stage and flush every source, then wire them into a [`Geocoder`].
    pub fn build(self) -> Result<Geocoder> {
        let mut sources: Vec<Arc<dyn Source>> = Vec::with_capacity(self.sources.len());
        for def in self.sources {
            let source = MemorySource::new(def.config)?;
            for feature in def.features {
                source.stage_feature(feature)?;
            }
            source.flush()?;
            sources.push(Arc::new(source));
        }
        Geocoder::new(sources)
    }
}
