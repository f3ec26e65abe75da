//! The [`Geocoder`]: sources in ordinal order plus the request pipeline.

use crate::api::{DebugInfo, GeocodeResponse, Options, SourcePhrasematches, response_feature};
use crate::cache::GridCache;
use crate::config::SourceConfig;
use crate::engine::context::{build_context, reverse};
use crate::engine::dedup::dedupe;
use crate::engine::phrasematch::phrasematch;
use crate::engine::ranking::sort_context;
use crate::engine::spatialmatch::{covers_for, stack};
use crate::engine::verifymatch::verify_features;
use crate::engine::{Context, CoverOptions, FeatureLookup, GeocodeMetrics, MAX_SOURCES};
use crate::error::Result;
use crate::feature::Feature;
use crate::source::{Source, SourceView};
use crate::text::{MAX_QUERY_TOKENS, Replacer, tokenize};
use crate::{Cover, Phrasematch};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// A set of sources queried together.
///
/// Ordinals follow the order sources were passed to [`Geocoder::new`] and
/// never change for the life of the geocoder.
pub struct Geocoder {
    sources: Vec<Arc<dyn Source>>,
    replacers: Vec<Replacer>,
    cache: GridCache,
}

impl std::fmt::Debug for Geocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Geocoder")
            .field("sources", &self.sources.iter().map(|s| s.config().name.as_str()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Views of every source pinned for one request.
struct Snapshot<'g> {
    sources: &'g [Arc<dyn Source>],
    views: Vec<Arc<dyn SourceView>>,
}

impl FeatureLookup for Snapshot<'_> {
    fn source_count(&self) -> usize {
        self.views.len()
    }

    fn source_config(&self, ordinal: usize) -> Option<&SourceConfig> {
        self.sources.get(ordinal).map(|s| s.config())
    }

    fn feature(&self, ordinal: usize, id: u32) -> Result<Option<Feature>> {
        match self.views.get(ordinal) {
            Some(view) => view.feature(id),
            None => Ok(None),
        }
    }

    fn features_at(&self, ordinal: usize, x: u32, y: u32) -> Result<Vec<u32>> {
        match self.views.get(ordinal) {
            Some(view) => view.features_at(x, y),
            None => Ok(Vec::new()),
        }
    }
}

/// `lon,lat` queries are reverse geocoded.
fn parse_reverse(query: &str) -> Option<[f64; 2]> {
    let caps = regex!(r"^\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*$").captures(query)?;
    let lon: f64 = caps[1].parse().ok()?;
    let lat: f64 = caps[2].parse().ok()?;
    ((-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat)).then_some([lon, lat])
}

impl Geocoder {
    /// Wire `sources` together; the index in the vector is the ordinal.
    ///
    /// More than [`MAX_SOURCES`] sources is allowed, but tmpids of the extra
    /// sources wrap onto the ordinals of the first ones.
    pub fn new(sources: Vec<Arc<dyn Source>>) -> Result<Self> {
        if sources.len() > MAX_SOURCES {
            tracing::warn!(
                sources = sources.len(),
                max = MAX_SOURCES,
                "more sources than tmpid ordinals, tmpids will collide"
            );
        }
        let replacers = sources.iter().map(|s| Replacer::new(&s.config().replacements)).collect::<Result<Vec<_>>>()?;
        tracing::debug!(sources = sources.len(), "geocoder ready");
        Ok(Self { sources, replacers, cache: GridCache::default() })
    }

    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Drop every cached grid read.
    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    fn snapshot(&self) -> Result<Snapshot<'_>> {
        let views = self.sources.iter().map(|s| s.view()).collect::<Result<Vec<_>>>()?;
        Ok(Snapshot { sources: &self.sources, views })
    }

    fn type_of(&self, ordinal: usize) -> Option<&str> {
        self.sources.get(ordinal).map(|s| s.config().type_name())
    }

    fn respond(&self, query: Vec<String>, contexts: &[Context], debug: Option<DebugInfo>) -> GeocodeResponse {
        let features = contexts.iter().filter_map(|c| response_feature(c, |o| self.type_of(o))).collect();
        GeocodeResponse { query, features, debug }
    }

    /// Run `query` through every source and return the ranked results.
    ///
    /// Any source failing aborts the whole request.
    pub fn geocode(&self, query: &str, options: &Options) -> Result<GeocodeResponse> {
        let started = Instant::now();
        let mut metrics = GeocodeMetrics::default();
        let snapshot = self.snapshot()?;

        if let Some(point) = parse_reverse(query) {
            let phase = Instant::now();
            let contexts: Vec<Context> = reverse(point, &snapshot)?.into_iter().collect();
            metrics.context = phase.elapsed();
            metrics.total = started.elapsed();
            tracing::debug!(lon = point[0], lat = point[1], found = contexts.len(), "reverse geocode");
            let debug = options.debug.then(|| DebugInfo {
                phrasematches: Vec::new(),
                spatialmatch: None,
                verifymatch: Vec::new(),
                metrics,
            });
            return Ok(self.respond(vec![query.trim().to_string()], &contexts, debug));
        }

        let mut tokens = tokenize(query);
        if tokens.len() > MAX_QUERY_TOKENS {
            tracing::warn!(tokens = tokens.len(), max = MAX_QUERY_TOKENS, "query truncated");
            tokens.truncate(MAX_QUERY_TOKENS);
        }
        metrics.counts.tokens = tokens.len();

        let params = options.fuzzy_params();
        let cover_options = CoverOptions { proximity: options.proximity, language: options.language.as_deref() };

        let phase = Instant::now();
        let per_source: Vec<(Vec<Phrasematch>, Vec<Cover>)> = snapshot
            .views
            .par_iter()
            .enumerate()
            .map(|(ordinal, view)| -> Result<(Vec<Phrasematch>, Vec<Cover>)> {
                let config = self.sources[ordinal].config();
                let query = self.replacers[ordinal].apply(tokens.clone());
                let phrasematches = phrasematch(&query, config.flags(), view.phrases(), params)?;
                let covers = covers_for(ordinal, config, view.as_ref(), &self.cache, &phrasematches, cover_options)?;
                tracing::trace!(
                    source = %config.name,
                    phrasematches = phrasematches.len(),
                    covers = covers.len(),
                    "matched source"
                );
                Ok((phrasematches, covers))
            })
            .collect::<Result<Vec<_>>>()?;
        metrics.phrasematch = phase.elapsed();
        metrics.counts.phrasematches = per_source.iter().map(|(p, _)| p.len()).sum();
        metrics.counts.covers = per_source.iter().map(|(_, c)| c.len()).sum();

        let (phrasematches, by_ordinal): (Vec<Vec<Phrasematch>>, Vec<Vec<Cover>>) = per_source.into_iter().unzip();

        let phase = Instant::now();
        let spatialmatches = stack(&by_ordinal);
        metrics.spatialmatch = phase.elapsed();
        metrics.counts.spatialmatches = spatialmatches.len();

        let phase = Instant::now();
        let verified = verify_features(&tokens, &snapshot, &spatialmatches, options.limit_verify)?;
        metrics.verifymatch = phase.elapsed();
        metrics.counts.verified = verified.len();
        let verifymatch: Vec<Feature> =
            if options.debug { verified.iter().map(|v| v.feature.clone()).collect() } else { Vec::new() };

        let phase = Instant::now();
        let verified = dedupe(verified, &snapshot);
        metrics.counts.deduped = verified.len();
        let mut contexts =
            verified.iter().map(|v| build_context(v, &snapshot)).collect::<Result<Vec<Context>>>()?;
        contexts.sort_by(sort_context);
        contexts.truncate(options.limit);
        metrics.context = phase.elapsed();
        metrics.total = started.elapsed();

        tracing::debug!(
            tokens = tokens.len(),
            spatialmatches = spatialmatches.len(),
            results = contexts.len(),
            elapsed_us = metrics.total.as_micros() as u64,
            "geocode"
        );

        let debug = options.debug.then(|| DebugInfo {
            phrasematches: phrasematches
                .into_iter()
                .enumerate()
                .map(|(ordinal, phrasematches)| SourcePhrasematches {
                    source: self.sources[ordinal].config().name.clone(),
                    ordinal,
                    phrasematches,
                })
                .collect(),
            spatialmatch: spatialmatches.first().cloned(),
            verifymatch,
            metrics,
        });
        Ok(self.respond(tokens, &contexts, debug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReplacementRule, SourceConfig};
    use crate::error::GeocodeError;
    use crate::feature::{Geometry, Properties};
    use crate::fuzzy::{EndingType, FuzzyMatch, PhraseLookup};
    use crate::source::{GridEntry, MemorySource};

    fn source(config: SourceConfig, features: Vec<Feature>) -> Arc<dyn Source> {
        let source = MemorySource::new(config).unwrap();
        for feature in features {
            source.stage_feature(feature).unwrap();
        }
        source.flush().unwrap();
        Arc::new(source)
    }

    fn at(id: u32, text: &str, center: [f64; 2]) -> Feature {
        let mut props = Properties::with_text(text);
        props.center = Some(center);
        Feature::new(id, props).with_geometry(Geometry::Point { coordinates: center })
    }

    fn springfield() -> Geocoder {
        let ring = vec![[-2.0, -2.0], [2.0, -2.0], [2.0, 2.0], [-2.0, 2.0], [-2.0, -2.0]];
        let square = Geometry::Polygon { coordinates: vec![ring] };
        let country = Feature::new(1, Properties::with_text("United States")).with_geometry(square);
        let mut address = Properties::with_text("Main Street");
        address.addressnumber = Some(vec![Some("100".into()), Some("102".into())]);
        let street =
            Feature::new(1, address).with_geometry(Geometry::MultiPoint { coordinates: vec![[0.5, 0.5], [0.51, 0.5]] });
        Geocoder::new(vec![
            source(SourceConfig::new("country"), vec![country]),
            source(
                SourceConfig::new("place"),
                vec![at(1, "Springfield", [0.5, 0.5]), at(2, "Shelbyville", [40.0, 40.0])],
            ),
            source(
                SourceConfig::new("address").with_address().with_replacement(ReplacementRule::new("st", "street")),
                vec![street],
            ),
        ])
        .unwrap()
    }

    #[derive(Clone, Copy)]
    enum Fault {
        Phrases,
        Grid,
    }

    /// Pins fine, then fails the chosen kind of read.
    struct Faulty {
        inner: Arc<dyn Source>,
        fault: Fault,
    }

    struct FaultyView {
        inner: Arc<dyn SourceView>,
        name: String,
        fault: Fault,
    }

    impl Source for Faulty {
        fn config(&self) -> &SourceConfig {
            self.inner.config()
        }

        fn view(&self) -> Result<Arc<dyn SourceView>> {
            let name = self.inner.config().name.clone();
            Ok(Arc::new(FaultyView { inner: self.inner.view()?, name, fault: self.fault }))
        }
    }

    impl PhraseLookup for FaultyView {
        fn contains(&self, _: &[String], _: EndingType) -> Result<bool> {
            Err(GeocodeError::PhraseLookup("dictionary unavailable".into()))
        }

        fn fuzzy_match(&self, _: &[String], _: u8, _: u8, _: EndingType) -> Result<Vec<FuzzyMatch>> {
            Err(GeocodeError::PhraseLookup("dictionary unavailable".into()))
        }
    }

    impl SourceView for FaultyView {
        fn phrases(&self) -> &dyn PhraseLookup {
            match self.fault {
                Fault::Phrases => self as &dyn PhraseLookup,
                Fault::Grid => self.inner.phrases(),
            }
        }

        fn grid(&self, phrase: &str, ending_type: EndingType) -> Result<Vec<GridEntry>> {
            match self.fault {
                Fault::Grid => {
                    Err(GeocodeError::Storage { source_name: self.name.clone(), reason: "grid shard missing".into() })
                }
                Fault::Phrases => self.inner.grid(phrase, ending_type),
            }
        }

        fn feature(&self, id: u32) -> Result<Option<Feature>> {
            self.inner.feature(id)
        }

        fn features_at(&self, x: u32, y: u32) -> Result<Vec<u32>> {
            self.inner.features_at(x, y)
        }

        fn generation(&self) -> u64 {
            self.inner.generation()
        }
    }

    fn springfield_with_faulty(fault: Fault) -> Geocoder {
        let mut sources = springfield().sources().to_vec();
        let inner = source(SourceConfig::new("locality"), vec![at(1, "Springfield", [0.5, 0.5])]);
        sources.push(Arc::new(Faulty { inner, fault }));
        Geocoder::new(sources).unwrap()
    }

    #[test]
    fn forward_geocode_builds_hierarchy() {
        let geocoder = springfield();
        let response = geocoder.geocode("springfield", &Options::default()).unwrap();
        assert_eq!(response.query, vec!["springfield".to_string()]);
        let top = &response.features[0];
        assert_eq!(top.id, "place.1");
        assert_eq!(top.place_name, "Springfield, United States");
        assert_eq!(top.relevance, 1.0);
        assert!(response.debug.is_none());
    }

    #[test]
    fn address_query_picks_the_house_number() {
        let geocoder = springfield();
        let response = geocoder.geocode("102 main st springfield", &Options::default()).unwrap();
        let top = &response.features[0];
        assert_eq!(top.id, "address.1");
        assert_eq!(top.address.as_deref(), Some("102"));
        assert_eq!(top.center, Some([0.51, 0.5]));
        assert_eq!(top.place_name, "102 Main Street, Springfield, United States");
        assert_eq!(top.relevance, 1.0);
    }

    #[test]
    fn empty_and_unmatched_queries_have_no_results() {
        let geocoder = springfield();
        assert!(geocoder.geocode("", &Options::default()).unwrap().features.is_empty());
        assert!(geocoder.geocode("atlantis", &Options::default()).unwrap().features.is_empty());
    }

    #[test]
    fn reverse_geocode_from_coordinates() {
        let geocoder = springfield();
        let response = geocoder.geocode("0.5,0.5", &Options::default()).unwrap();
        assert_eq!(response.features[0].id, "address.1");
        assert_eq!(response.features[0].relevance, 1.0);
        assert_eq!(parse_reverse("200,0"), None);
        assert_eq!(parse_reverse(" -87.6, 41.8 "), Some([-87.6, 41.8]));
    }

    #[test]
    fn debug_carries_intermediate_state() {
        let geocoder = springfield();
        let options = Options { debug: true, ..Options::default() };
        let response = geocoder.geocode("springfield", &options).unwrap();
        let debug = response.debug.unwrap();
        assert_eq!(debug.phrasematches.len(), 3);
        assert_eq!(debug.phrasematches[1].source, "place");
        assert!(!debug.phrasematches[1].phrasematches.is_empty());
        assert_eq!(debug.spatialmatch.map(|sm| sm.covers[0].tmpid.get()), Some((1 << 24) + 1));
        assert!(debug.verifymatch.iter().all(|f| f.properties.tmpid.is_some()));
        assert_eq!(debug.metrics.counts.tokens, 1);
    }

    #[test]
    fn limit_caps_results() {
        let geocoder = springfield();
        let options = Options { limit: 1, ..Options::default() };
        // "s" prefixes both places
        assert_eq!(geocoder.geocode("s", &options).unwrap().features.len(), 1);
    }

    #[test]
    fn expanding_replacements_on_a_long_query() {
        let config =
            SourceConfig::new("street").with_replacement(ReplacementRule::new("([^ ]+)(strasse)", "$1 str"));
        let geocoder = Geocoder::new(vec![source(config, vec![at(1, "Hermanstrasse", [13.4, 52.5])])]).unwrap();
        // 17 tokens expand to 34, past the mask width
        let response = geocoder.geocode(&"hermanstrasse ".repeat(17), &Options::default()).unwrap();
        assert_eq!(response.query.len(), 17);
        assert_eq!(response.features[0].text, "Hermanstrasse");
    }

    #[test]
    fn repeated_house_numbers_collapse_to_one_result() {
        let mut props = Properties::with_text("Stationsplein");
        props.addressnumber = Some(vec![Some("9".into()); 3]);
        let street = Feature::new(1, props).with_geometry(Geometry::MultiPoint {
            coordinates: vec![[4.90, 52.37], [4.91, 52.37], [4.92, 52.37]],
        });
        let geocoder = Geocoder::new(vec![source(SourceConfig::new("address").with_address(), vec![street])]).unwrap();
        let response = geocoder.geocode("9 stationsplein", &Options::default()).unwrap();
        let names: Vec<&str> = response.features.iter().map(|f| f.place_name.as_str()).collect();
        assert_eq!(names, vec!["9 Stationsplein", "Stationsplein"]);
    }

    #[test]
    fn failing_phrase_lookup_fails_the_request() {
        let err = springfield_with_faulty(Fault::Phrases).geocode("springfield", &Options::default()).unwrap_err();
        assert!(matches!(err, GeocodeError::PhraseLookup(_)));
    }

    #[test]
    fn failing_grid_read_fails_the_request() {
        let err = springfield_with_faulty(Fault::Grid).geocode("springfield", &Options::default()).unwrap_err();
        assert!(matches!(err, GeocodeError::Storage { ref source_name, .. } if source_name == "locality"));
    }
}
