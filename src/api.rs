use crate::engine::{Context, FuzzyParams, GeocodeMetrics};
use crate::feature::{Feature, Geometry};
use crate::{Phrasematch, Spatialmatch};
use serde::{Deserialize, Serialize};

/// Per-request options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Results returned.
    pub limit: usize,
    /// Spatialmatches verified against stored features.
    pub limit_verify: usize,
    /// Attach [`DebugInfo`] to the response.
    pub debug: bool,
    /// Allow the last query word to match as a prefix.
    pub autocomplete: bool,
    pub fuzzy_match: bool,
    /// `[lon, lat]` to bias results toward.
    pub proximity: Option<[f64; 2]>,
    pub language: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            limit: 5,
            limit_verify: 10,
            debug: false,
            autocomplete: true,
            fuzzy_match: true,
            proximity: None,
            language: None,
        }
    }
}

impl Options {
    pub fn fuzzy_params(&self) -> FuzzyParams {
        let (max_word_dist, max_phrase_dist) = if self.fuzzy_match { (1, 2) } else { (0, 0) };
        FuzzyParams { max_word_dist, max_phrase_dist, autocomplete: self.autocomplete }
    }
}

/// Result of [`Geocoder::geocode`](crate::Geocoder::geocode).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResponse {
    /// Query tokens as matched, after tokenization and truncation.
    pub query: Vec<String>,
    pub features: Vec<ResponseFeature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFeature {
    /// `"<type>.<feature id>"`.
    pub id: String,
    pub place_type: Vec<String>,
    pub relevance: f64,
    pub text: String,
    pub place_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    pub context: Vec<ContextEntry>,
}

/// A less specific member of a result's context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub id: String,
    pub text: String,
}

/// Phrasematches produced by one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcePhrasematches {
    pub source: String,
    pub ordinal: usize,
    pub phrasematches: Vec<Phrasematch>,
}

/// Intermediate state of a request, for debugging relevance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugInfo {
    pub phrasematches: Vec<SourcePhrasematches>,
    /// Best spatialmatch, covers included.
    pub spatialmatch: Option<Spatialmatch>,
    /// Every verified feature, with `carmen:tmpid` stamped.
    pub verifymatch: Vec<Feature>,
    pub metrics: GeocodeMetrics,
}

/// `type_of(ordinal)` names the type of a source.
pub(crate) fn response_feature<'a>(
    context: &Context,
    type_of: impl Fn(usize) -> Option<&'a str>,
) -> Option<ResponseFeature> {
    let (head, rest) = context.members.split_first()?;
    let feature = &head.feature;
    let type_name = type_of(head.ordinal).unwrap_or_default();
    let place_type = match &feature.properties.types {
        Some(types) if !types.is_empty() => types.clone(),
        _ => vec![type_name.to_string()],
    };

    Some(ResponseFeature {
        id: format!("{}.{}", type_name, feature.id),
        place_type,
        relevance: context.relevance,
        place_name: context.place_name(),
        text: feature.display_text().to_string(),
        center: feature.center(),
        address: feature.properties.address.clone(),
        geometry: feature.geometry.clone(),
        context: rest
            .iter()
            .map(|m| ContextEntry {
                id: format!("{}.{}", type_of(m.ordinal).unwrap_or_default(), m.feature.id),
                text: m.feature.display_text().to_string(),
            })
            .collect(),
    })
}
