//! Context assembly: the hierarchy a result sits in.
//!
//! A context starts with the verified head feature and its surviving parents.
//! Lower sources whose type is still missing are then filled in with the
//! first feature at the head's center that contains it:
//!
//! ```text
//! address (head)  100 Main Street
//! place   (cover) Springfield
//! region  (fill)  Illinois          <- features_at(center tile) + contains(center)
//! country (fill)  United States
//! ```
//!
//! Contexts are plain values, built once per result and never mutated.

use super::verifymatch::{FeatureLookup, VerifiedFeature};
use crate::error::Result;
use crate::feature::{Feature, lonlat_to_tile};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ContextMember {
    pub ordinal: usize,
    pub feature: Feature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// Most specific first; `members[0]` is the head.
    pub members: Vec<ContextMember>,
    pub relevance: f64,
    pub distance: Option<f64>,
    /// Position of the head's type among the geocoder's distinct types.
    pub typeindex: Option<usize>,
}

impl Context {
    pub fn head(&self) -> Option<&Feature> {
        self.members.first().map(|m| &m.feature)
    }

    /// Display texts joined most specific first. A matched house number
    /// prefixes the head.
    pub fn place_name(&self) -> String {
        let mut parts: Vec<String> = self.members.iter().map(|m| m.feature.display_text().to_string()).collect();
        let number = self.head().and_then(|f| f.properties.address.as_ref());
        if let (Some(first), Some(number)) = (parts.first_mut(), number) {
            *first = format!("{number} {first}");
        }
        parts.join(", ")
    }
}

/// Index of the type of source `ordinal` among distinct types in ordinal order.
pub fn type_index(lookup: &dyn FeatureLookup, ordinal: usize) -> Option<usize> {
    let target = lookup.source_config(ordinal)?.type_name();
    let mut seen: Vec<&str> = Vec::new();
    for o in 0..lookup.source_count() {
        let Some(config) = lookup.source_config(o) else {
            continue;
        };
        let name = config.type_name();
        if name == target {
            return Some(seen.iter().position(|s| *s == name).unwrap_or(seen.len()));
        }
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    None
}

/// First feature of source `ordinal` containing `point`.
fn containing(lookup: &dyn FeatureLookup, ordinal: usize, point: [f64; 2]) -> Result<Option<Feature>> {
    let Some(config) = lookup.source_config(ordinal) else {
        return Ok(None);
    };
    let (x, y) = lonlat_to_tile(point[0], point[1], config.maxzoom);
    for id in lookup.features_at(ordinal, x, y)? {
        if let Some(feature) = lookup.feature(ordinal, id)? {
            if feature.contains(point, config.maxzoom) {
                return Ok(Some(feature));
            }
        }
    }
    Ok(None)
}

/// Build the context of one verified feature.
pub fn build_context(verified: &VerifiedFeature, lookup: &dyn FeatureLookup) -> Result<Context> {
    let mut members = vec![ContextMember { ordinal: verified.ordinal, feature: verified.feature.clone() }];
    members.extend(verified.parents.iter().map(|p| ContextMember { ordinal: p.ordinal, feature: p.feature.clone() }));

    let type_of = |ordinal: usize| lookup.source_config(ordinal).map(|c| c.type_name().to_string());
    let mut present: HashSet<String> = members.iter().filter_map(|m| type_of(m.ordinal)).collect();

    if let Some(center) = verified.feature.center() {
        for ordinal in (0..verified.ordinal).rev() {
            let Some(type_name) = type_of(ordinal) else {
                continue;
            };
            if present.contains(&type_name) {
                continue;
            }
            if let Some(feature) = containing(lookup, ordinal, center)? {
                members.push(ContextMember { ordinal, feature });
                present.insert(type_name);
            }
        }
    }

    // Head stays first; everything else most specific first.
    members[1..].sort_by(|a, b| b.ordinal.cmp(&a.ordinal));

    Ok(Context {
        members,
        relevance: verified.feature.properties.relevance.unwrap_or(0.0),
        distance: verified.distance,
        typeindex: type_index(lookup, verified.ordinal),
    })
}

/// Context of the most specific feature containing `point`, relevance 1.
pub fn reverse(point: [f64; 2], lookup: &dyn FeatureLookup) -> Result<Option<Context>> {
    for ordinal in (0..lookup.source_count()).rev() {
        if let Some(mut feature) = containing(lookup, ordinal, point)? {
            feature.properties.relevance = Some(1.0);
            let verified = VerifiedFeature { ordinal, feature, parents: Vec::new(), distance: None };
            return build_context(&verified, lookup).map(Some);
        }
    }
    Ok(None)
}
