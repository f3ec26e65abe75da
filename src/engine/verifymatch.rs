//! Verification: turn the best spatialmatches back into stored features.
//!
//! Covers are resolved through the cover's own ordinal, never by decoding the
//! tmpid, so wrapped tmpids past 256 sources still find the right record.
//! A cover whose feature has disappeared is skipped. A parent that does not
//! actually contain the head feature is dropped and its weight taken off the
//! relevance; this is what lets a lower-scored but spatially consistent
//! feature outrank a higher-scored one.
//!
//! Address sources fan a verified feature out into one instance per matching
//! house number, capped at [`MAX_ADDRESS_INSTANCES`].

use super::TmpId;
use super::ranking::sort_feature;
use crate::config::{SourceConfig, SourceFlags};
use crate::error::Result;
use crate::feature::{Feature, Geometry, SpatialmatchRelev, tile_center};
use crate::text::is_numeric;
use crate::{Cover, Spatialmatch};

/// Verified instances kept per base feature.
pub const MAX_ADDRESS_INSTANCES: usize = 10;

/// Feature storage as seen by verification and context assembly.
pub trait FeatureLookup: Sync {
    fn source_count(&self) -> usize;

    fn source_config(&self, ordinal: usize) -> Option<&SourceConfig>;

    fn feature(&self, ordinal: usize, id: u32) -> Result<Option<Feature>>;

    /// Ids of features covering tile `(x, y)` at the source's maxzoom.
    fn features_at(&self, ordinal: usize, x: u32, y: u32) -> Result<Vec<u32>>;
}

/// A parent cover that survived verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedParent {
    pub ordinal: usize,
    pub tmpid: TmpId,
    pub feature: Feature,
}

/// A stored feature annotated for the current query.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedFeature {
    pub ordinal: usize,
    pub feature: Feature,
    pub parents: Vec<VerifiedParent>,
    /// Head cover distance to the proximity point.
    pub distance: Option<f64>,
}

/// First purely numeric original token inside `mask`.
fn address_number<'q>(query: &'q [String], mask: u32) -> Option<&'q str> {
    query
        .iter()
        .enumerate()
        .find(|(i, t)| *i < 32 && mask & (1u32 << *i) != 0 && is_numeric(t))
        .map(|(_, t)| t.as_str())
}

fn head_center(feature: &Feature, head: &Cover) -> [f64; 2] {
    feature.center().unwrap_or_else(|| tile_center(head.x, head.y, head.zoom))
}

/// Verify the first `limit_verify` spatialmatches and return the resulting
/// features in [`sort_feature`] order.
///
/// `query` is the original token sequence masks refer to.
pub fn verify_features(
    query: &[String],
    lookup: &dyn FeatureLookup,
    spatialmatches: &[Spatialmatch],
    limit_verify: usize,
) -> Result<Vec<VerifiedFeature>> {
    let mut out = Vec::new();

    for sm in spatialmatches.iter().take(limit_verify) {
        let Some(head) = sm.head() else {
            continue;
        };
        let Some(base) = lookup.feature(head.ordinal, head.id)? else {
            tracing::debug!(
                ordinal = head.ordinal,
                id = head.id,
                tmpid = head.tmpid.get(),
                "cover feature missing, skipped"
            );
            continue;
        };
        let center = head_center(&base, head);

        let mut relevance = sm.relev;
        let mut parents = Vec::new();
        for cover in &sm.covers[1..] {
            let zoom = lookup.source_config(cover.ordinal).map_or(cover.zoom, |c| c.maxzoom);
            match lookup.feature(cover.ordinal, cover.id)? {
                Some(feature) if feature.contains(center, zoom) => {
                    parents.push(VerifiedParent { ordinal: cover.ordinal, tmpid: cover.tmpid, feature });
                }
                found => {
                    tracing::trace!(
                        head = head.tmpid.get(),
                        parent = cover.tmpid.get(),
                        missing = found.is_none(),
                        "parent does not contain head, dropped"
                    );
                    relevance -= cover.relev;
                }
            }
        }
        let relevance = relevance.clamp(0.0, 1.0);

        let address = lookup.source_config(head.ordinal).is_some_and(|c| c.flags().contains(SourceFlags::ADDRESS));
        let instances = match address_number(query, head.mask).filter(|_| address) {
            Some(number) => address_instances(&base, number),
            None => vec![base],
        };

        for mut feature in instances {
            let props = &mut feature.properties;
            props.relevance = Some(relevance);
            props.spatialmatch = Some(SpatialmatchRelev { relev: sm.relev });
            props.tmpid = Some(head.tmpid.get());
            props.scoredist = Some(head.scoredist);
            out.push(VerifiedFeature {
                ordinal: head.ordinal,
                feature,
                parents: parents.clone(),
                distance: head.distance,
            });
        }
    }

    out.sort_by(|a, b| sort_feature(&a.feature, &b.feature));
    tracing::debug!(verified = out.len(), "verified features");
    Ok(out)
}

/// One instance per matching house number, at most [`MAX_ADDRESS_INSTANCES`].
/// No match leaves the street itself.
fn address_instances(base: &Feature, number: &str) -> Vec<Feature> {
    let positions = base.address_positions(number);
    if positions.is_empty() {
        return vec![base.clone()];
    }
    if positions.len() > MAX_ADDRESS_INSTANCES {
        tracing::trace!(id = base.id, matches = positions.len(), "address matches truncated");
    }
    positions
        .into_iter()
        .take(MAX_ADDRESS_INSTANCES)
        .map(|position| {
            let mut feature = base.clone();
            feature.properties.address = Some(number.to_string());
            feature.properties.position = Some(position);
            if let Some(point) = base.point_at(position) {
                feature.properties.center = Some(point);
                feature.geometry = Some(Geometry::Point { coordinates: point });
            }
            feature
        })
        .collect()
}
