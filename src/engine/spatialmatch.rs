//! Covers and spatial stacking.
//!
//! Phrasematches become covers by reading the grid: one cover per (feature,
//! tile) posting. Covers from different sources are then stacked into
//! spatialmatches:
//!
//! ```text
//! ordinal   3 address   ┌ 100 main st ┐ (head, mask 0b0111)
//! ordinal   2 place     │ springfield │ (mask 0b1000, tile aligned with head)
//! ordinal   1 region    │      -      │ (no compatible cover)
//! ordinal   0 country   └      -      ┘
//! ```
//!
//! Every cover heads one stack. Lower ordinals are visited from the most
//! specific down and each contributes at most its best cover whose mask is
//! disjoint from the stack so far and whose tile overlaps the head's.

use super::TmpId;
use crate::cache::GridCache;
use crate::config::SourceConfig;
use crate::error::Result;
use crate::feature::{haversine_km, tile_center, tiles_overlap};
use crate::source::SourceView;
use crate::{Cover, Phrasematch, Spatialmatch};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Weight of proximity in `scoredist` at zero distance.
pub const PROXIMITY_WEIGHT: f64 = 100.0;

/// Share of a phrasematch's weight lost per edit.
pub const EDIT_PENALTY: f64 = 0.1;

/// Per-request inputs that shape covers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverOptions<'a> {
    /// `[lon, lat]`.
    pub proximity: Option<[f64; 2]>,
    pub language: Option<&'a str>,
}

/// Score with proximity folded in. Without a proximity point this is the score.
pub fn scoredist(score: f64, distance: Option<f64>) -> f64 {
    match distance {
        None => score,
        Some(d) => PROXIMITY_WEIGHT / (1.0 + d) + (1.0 + score.max(0.0)).ln(),
    }
}

/// Cover relevance of a phrasematch: its weight, less [`EDIT_PENALTY`] per edit.
pub fn cover_relev(pm: &Phrasematch) -> f64 {
    pm.weight * (1.0 - EDIT_PENALTY * f64::from(pm.edit_distance)).max(0.0)
}

/// Covers for every phrasematch of the source at `ordinal`.
pub fn covers_for(
    ordinal: usize,
    config: &SourceConfig,
    view: &dyn SourceView,
    cache: &GridCache,
    phrasematches: &[Phrasematch],
    options: CoverOptions<'_>,
) -> Result<Vec<Cover>> {
    let matches_language = config.matches_language(options.language);
    let mut seen = HashSet::new();
    let mut covers = Vec::new();

    for pm in phrasematches {
        let relev = cover_relev(pm);
        let postings = cache.grid(ordinal, view, &pm.phrase, pm.ending_type)?;
        for entry in postings.iter() {
            if !seen.insert((entry.id, entry.x, entry.y, pm.mask)) {
                continue;
            }
            let distance =
                options.proximity.map(|point| haversine_km(point, tile_center(entry.x, entry.y, config.maxzoom)));
            covers.push(Cover {
                x: entry.x,
                y: entry.y,
                zoom: config.maxzoom,
                id: entry.id,
                ordinal,
                tmpid: TmpId::encode(ordinal, entry.id),
                mask: pm.mask,
                relev,
                distance,
                score: entry.score,
                scoredist: scoredist(entry.score, distance),
                matches_language,
                prefix: pm.prefix(),
                text: pm.phrase.clone(),
            });
        }
    }
    Ok(covers)
}

/// Preference between two candidate covers for the same stack slot.
fn cover_order(a: &Cover, b: &Cover) -> Ordering {
    b.relev
        .total_cmp(&a.relev)
        .then_with(|| b.scoredist.total_cmp(&a.scoredist))
        .then_with(|| a.tmpid.cmp(&b.tmpid))
}

/// Stack covers into spatialmatches. `by_ordinal[i]` holds source `i`'s covers.
///
/// The result is sorted and holds one spatialmatch per distinct stack.
pub fn stack(by_ordinal: &[Vec<Cover>]) -> Vec<Spatialmatch> {
    let mut out = Vec::new();

    for (ordinal, covers) in by_ordinal.iter().enumerate() {
        for head in covers {
            let mut mask = head.mask;
            let mut relev = head.relev;
            let mut members = vec![head.clone()];

            for lower in by_ordinal[..ordinal].iter().rev() {
                let best = lower
                    .iter()
                    .filter(|c| c.mask & mask == 0)
                    .filter(|c| tiles_overlap((head.x, head.y), head.zoom, (c.x, c.y), c.zoom))
                    .min_by(|a, b| cover_order(a, b));
                if let Some(parent) = best {
                    mask |= parent.mask;
                    relev += parent.relev;
                    members.push(parent.clone());
                }
            }

            out.push(Spatialmatch { relev: relev.min(1.0), covers: members });
        }
    }

    sort_spatialmatches(&mut out);

    let mut seen = HashSet::new();
    out.retain(|sm| seen.insert(sm.covers.iter().map(|c| (c.ordinal, c.id, c.mask)).collect::<Vec<_>>()));
    tracing::debug!(spatialmatches = out.len(), "stacked covers");
    out
}

/// Relevance desc, head scoredist desc, language match first, head tmpid asc.
pub fn sort_spatialmatches(matches: &mut [Spatialmatch]) {
    matches.sort_by(|a, b| {
        b.relev.total_cmp(&a.relev).then_with(|| match (a.head(), b.head()) {
            (Some(ha), Some(hb)) => hb
                .scoredist
                .total_cmp(&ha.scoredist)
                .then_with(|| hb.matches_language.cmp(&ha.matches_language))
                .then_with(|| ha.tmpid.cmp(&hb.tmpid)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
    });
}
