//! Source storage.
//!
//! The query pipeline only sees sources through [`Source`] and [`SourceView`].
//! A view is an immutable snapshot: a request pins one view per source up
//! front, so a concurrent flush never shows it half of a rebuild.
//!
//! [`MemorySource`] is the in-memory implementation used by the CLI and the
//! tests. Its lifecycle mirrors a bulk indexer:
//!
//! ```text
//! stage_feature ──> staged (invisible)
//!                      │ flush
//!                      v
//!               build MemoryIndex ──> swap live Arc, generation + 1
//! ```

use crate::config::{SourceConfig, SourceFlags};
use crate::engine::FEATURE_ID_MASK;
use crate::error::{GeocodeError, Result};
use crate::feature::Feature;
use crate::fuzzy::{EndingType, MemoryPhraseSet, MemoryPhraseSetBuilder, PhraseLookup};
use crate::text::{Replacer, numeric_class};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// One (feature, tile) posting of an indexed phrase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridEntry {
    pub id: u32,
    pub x: u32,
    pub y: u32,
    pub score: f64,
}

/// A configured, independently indexed dataset.
pub trait Source: Send + Sync {
    fn config(&self) -> &SourceConfig;

    /// Pin the currently visible index.
    fn view(&self) -> Result<Arc<dyn SourceView>>;
}

/// Read-only snapshot of one source's index. Safe for concurrent readers.
pub trait SourceView: Send + Sync {
    fn phrases(&self) -> &dyn PhraseLookup;

    /// Grid postings for `phrase` under `ending_type` semantics.
    fn grid(&self, phrase: &str, ending_type: EndingType) -> Result<Vec<GridEntry>>;

    fn feature(&self, id: u32) -> Result<Option<Feature>>;

    /// Ids of features covering tile `(x, y)` at the source's maxzoom, ascending.
    fn features_at(&self, x: u32, y: u32) -> Result<Vec<u32>>;

    /// Bumped by every flush; part of grid cache keys.
    fn generation(&self) -> u64;
}

/// Built, immutable in-memory index.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    features: BTreeMap<u32, Feature>,
    phrases: MemoryPhraseSet,
    grid: BTreeMap<String, Vec<GridEntry>>,
    tiles: HashMap<(u32, u32), Vec<u32>>,
    generation: u64,
}

impl MemoryIndex {
    fn build(config: &SourceConfig, replacer: &Replacer, features: BTreeMap<u32, Feature>, generation: u64) -> Self {
        let address = config.flags().contains(SourceFlags::ADDRESS);
        let mut phrases = MemoryPhraseSetBuilder::new();
        let mut grid: BTreeMap<String, Vec<GridEntry>> = BTreeMap::new();
        let mut tiles: HashMap<(u32, u32), Vec<u32>> = HashMap::new();

        for feature in features.values() {
            let coverage = feature.coverage(config.maxzoom);
            for &tile in &coverage {
                tiles.entry(tile).or_default().push(feature.id);
            }

            let classes = if address { address_classes(feature) } else { BTreeSet::new() };
            let mut keys: Vec<Vec<String>> = Vec::new();
            for synonym in feature.synonyms() {
                let phrase = replacer.phrase(synonym);
                if phrase.is_empty() {
                    continue;
                }
                for class in &classes {
                    let mut numbered = Vec::with_capacity(phrase.len() + 1);
                    numbered.push(class.clone());
                    numbered.extend(phrase.iter().cloned());
                    keys.push(numbered);
                }
                keys.push(phrase);
            }
            keys.sort();
            keys.dedup();

            for key in keys {
                phrases.insert(&key);
                let postings = grid.entry(key.join(" ")).or_default();
                let score = feature.score();
                postings.extend(coverage.iter().map(|&(x, y)| GridEntry { id: feature.id, x, y, score }));
            }
        }

        Self { features, phrases: phrases.finish(), grid, tiles, generation }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl SourceView for MemoryIndex {
    fn phrases(&self) -> &dyn PhraseLookup {
        &self.phrases
    }

    fn grid(&self, phrase: &str, ending_type: EndingType) -> Result<Vec<GridEntry>> {
        if ending_type == EndingType::NonPrefix {
            return Ok(self.grid.get(phrase).cloned().unwrap_or_default());
        }

        let boundary = format!("{phrase} ");
        let mut seen = HashSet::new();
        let mut out: Vec<GridEntry> = Vec::new();
        for (key, postings) in self.grid.range(phrase.to_string()..).take_while(|(k, _)| k.starts_with(phrase)) {
            if ending_type == EndingType::WordBoundaryPrefix && key != phrase && !key.starts_with(&boundary) {
                continue;
            }
            out.extend(postings.iter().filter(|e| seen.insert((e.id, e.x, e.y))));
        }
        Ok(out)
    }

    fn feature(&self, id: u32) -> Result<Option<Feature>> {
        Ok(self.features.get(&id).cloned())
    }

    fn features_at(&self, x: u32, y: u32) -> Result<Vec<u32>> {
        Ok(self.tiles.get(&(x, y)).cloned().unwrap_or_default())
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

/// Numeric classes of every house number a feature can answer for.
fn address_classes(feature: &Feature) -> BTreeSet<String> {
    let mut classes = BTreeSet::new();
    let Some(numbers) = &feature.properties.addressnumber else {
        return classes;
    };
    for number in numbers.iter().flatten() {
        let number = number.trim().to_lowercase();
        if let Some(class) = numeric_class(&number) {
            classes.insert(class);
            continue;
        }
        if let Some((lo, hi)) = number.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.trim().parse::<u64>(), hi.trim().parse::<u64>()) {
                classes.extend(range_classes(lo.min(hi), lo.max(hi)));
            }
            continue;
        }
        // "12b" style: class of the leading digits.
        let digits: String = number.chars().take_while(char::is_ascii_digit).collect();
        if let Some(class) = numeric_class(&digits) {
            classes.insert(class);
        }
    }
    classes
}

fn range_classes(lo: u64, hi: u64) -> Vec<String> {
    let mut out = Vec::new();
    let (min_len, max_len) = (digit_len(lo), digit_len(hi));
    for len in min_len..=max_len {
        if len == 1 {
            out.push("#".to_string());
            continue;
        }
        let unit = 10u64.pow(len - 1);
        for lead in 1..=9u64 {
            let (start, end) = (lead * unit, (lead + 1) * unit - 1);
            if start <= hi && end >= lo {
                out.push(format!("{lead}{}", "#".repeat(len as usize - 1)));
            }
        }
    }
    out
}

fn digit_len(n: u64) -> u32 {
    n.checked_ilog10().map_or(1, |l| l + 1)
}

/// In-memory source with staged bulk flushes.
pub struct MemorySource {
    config: SourceConfig,
    replacer: Replacer,
    staged: Mutex<BTreeMap<u32, Feature>>,
    live: RwLock<Arc<MemoryIndex>>,
    /// Held from taking `staged` until the new index is live.
    flushing: Mutex<()>,
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("name", &self.config.name)
            .field("staged", &self.staged.lock().len())
            .field("live", &self.live.read().len())
            .finish()
    }
}

impl MemorySource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let replacer = Replacer::new(&config.replacements)?;
        Ok(Self {
            config,
            replacer,
            staged: Mutex::new(BTreeMap::new()),
            live: RwLock::new(Arc::default()),
            flushing: Mutex::new(()),
        })
    }

    /// Queue a feature for the next flush. Not queryable until then.
    pub fn stage_feature(&self, feature: Feature) -> Result<()> {
        if feature.id == 0 || feature.id > FEATURE_ID_MASK {
            return Err(GeocodeError::FeatureIdOutOfRange { id: feature.id, max: FEATURE_ID_MASK });
        }
        self.staged.lock().insert(feature.id, feature);
        Ok(())
    }

    pub fn staged_len(&self) -> usize {
        self.staged.lock().len()
    }

    /// Build a new index from the live features plus everything staged and
    /// swap it in. Readers see either the old or the new index, and
    /// concurrent flushes apply one after the other.
    pub fn flush(&self) -> Result<()> {
        let _flushing = self.flushing.lock();
        let staged = std::mem::take(&mut *self.staged.lock());
        let current = self.live.read().clone();

        let mut features = current.features.clone();
        let count = staged.len();
        features.extend(staged);

        let index = MemoryIndex::build(&self.config, &self.replacer, features, current.generation + 1);
        tracing::debug!(source = %self.config.name, staged = count, total = index.len(), "flushed source");
        *self.live.write() = Arc::new(index);
        Ok(())
    }

    /// Combine independently built sources into one. Feature ids are kept as
    /// is; an id present in two parts is a conflict.
    pub fn merge(config: SourceConfig, parts: &[&MemorySource]) -> Result<Self> {
        let merged = Self::new(config)?;
        let mut features: BTreeMap<u32, Feature> = BTreeMap::new();
        for part in parts {
            let live = part.live.read().clone();
            for (id, feature) in &live.features {
                if features.insert(*id, feature.clone()).is_some() {
                    return Err(GeocodeError::MergeConflict { source_name: merged.config.name.clone(), id: *id });
                }
            }
        }
        tracing::debug!(source = %merged.config.name, parts = parts.len(), total = features.len(), "merged sources");
        *merged.staged.lock() = features;
        merged.flush()?;
        Ok(merged)
    }
}

impl Source for MemorySource {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn view(&self) -> Result<Arc<dyn SourceView>> {
        let index: Arc<MemoryIndex> = self.live.read().clone();
        Ok(index)
    }
}
