//! Stored feature documents and the geometry they carry.
//!
//! A [`Feature`] is a GeoJSON-like record. The geocoder only reads a handful
//! of `carmen:*` properties; everything else rides along in
//! [`Properties::extra`]. Verification stamps per-query annotations
//! (`carmen:relevance`, `carmen:position`, ...) onto a cloned copy, never onto
//! the stored record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::f64::consts::PI;

/// Web Mercator latitude limit.
pub const MAX_LAT: f64 = 85.05112878;

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Relevance snapshot of the spatialmatch a verified feature came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialmatchRelev {
    pub relev: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    /// Comma separated synonyms; the first one is the display text.
    #[serde(rename = "carmen:text", default)]
    pub text: String,
    #[serde(rename = "carmen:center", default, skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 2]>,
    #[serde(rename = "carmen:score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Explicit tile coverage as `"z/x/y"` strings.
    #[serde(rename = "carmen:zxy", default, skip_serializing_if = "Option::is_none")]
    pub zxy: Option<Vec<String>>,
    /// House number candidates, aligned with the points of a `MultiPoint` geometry.
    #[serde(rename = "carmen:addressnumber", default, skip_serializing_if = "Option::is_none")]
    pub addressnumber: Option<Vec<Option<String>>>,
    #[serde(rename = "carmen:types", default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,

    // Per-query annotations.
    #[serde(rename = "carmen:address", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "carmen:position", default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(rename = "carmen:relevance", default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(rename = "carmen:scoredist", default, skip_serializing_if = "Option::is_none")]
    pub scoredist: Option<f64>,
    #[serde(rename = "carmen:spatialmatch", default, skip_serializing_if = "Option::is_none")]
    pub spatialmatch: Option<SpatialmatchRelev>,
    #[serde(rename = "carmen:tmpid", default, skip_serializing_if = "Option::is_none")]
    pub tmpid: Option<u32>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Properties {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: [f64; 2],
    },
    MultiPoint {
        coordinates: Vec<[f64; 2]>,
    },
    /// Outer ring first, then holes.
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    /// Placeholder for a geometry too large to ship with a result.
    Omitted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: u32,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn new(id: u32, properties: Properties) -> Self {
        Self { id, properties, geometry: None }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// First synonym of `carmen:text`.
    pub fn display_text(&self) -> &str {
        self.synonyms().next().unwrap_or("")
    }

    pub fn synonyms(&self) -> impl Iterator<Item = &str> {
        self.properties.text.split(',').map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn score(&self) -> f64 {
        self.properties.score.unwrap_or(0.0)
    }

    pub fn is_omitted(&self) -> bool {
        matches!(self.geometry, Some(Geometry::Omitted))
    }

    /// `carmen:center`, else a point derived from the geometry.
    pub fn center(&self) -> Option<[f64; 2]> {
        if let Some(center) = self.properties.center {
            return Some(center);
        }
        match self.geometry.as_ref()? {
            Geometry::Point { coordinates } => Some(*coordinates),
            Geometry::MultiPoint { coordinates } => coordinates.first().copied(),
            Geometry::Polygon { coordinates } => {
                let (min, max) = ring_bbox(coordinates.first()?)?;
                Some([(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0])
            }
            Geometry::Omitted => None,
        }
    }

    /// Tiles this feature covers at `zoom`.
    ///
    /// Explicit `carmen:zxy` wins, then the polygon bounding box, then the
    /// tile of the center.
    pub fn coverage(&self, zoom: u8) -> Vec<(u32, u32)> {
        if let Some(zxy) = &self.properties.zxy {
            let mut tiles: Vec<(u32, u32)> =
                zxy.iter().filter_map(|s| parse_zxy(s)).flat_map(|t| rezoom(t, zoom)).collect();
            tiles.sort_unstable();
            tiles.dedup();
            if !tiles.is_empty() {
                return tiles;
            }
        }
        if let Some(Geometry::Polygon { coordinates }) = &self.geometry {
            if let Some((min, max)) = coordinates.first().and_then(|ring| ring_bbox(ring)) {
                let (x0, y0) = lonlat_to_tile(min[0], max[1], zoom);
                let (x1, y1) = lonlat_to_tile(max[0], min[1], zoom);
                return (x0..=x1).flat_map(|x| (y0..=y1).map(move |y| (x, y))).collect();
            }
        }
        match self.center() {
            Some([lon, lat]) => vec![lonlat_to_tile(lon, lat, zoom)],
            None => Vec::new(),
        }
    }

    /// Whether the feature contains `point`. Polygons are tested exactly;
    /// other features by tile coverage at `zoom`.
    pub fn contains(&self, point: [f64; 2], zoom: u8) -> bool {
        match &self.geometry {
            Some(Geometry::Polygon { coordinates }) => polygon_contains(coordinates, point),
            _ => {
                let tile = lonlat_to_tile(point[0], point[1], zoom);
                self.coverage(zoom).contains(&tile)
            }
        }
    }

    /// Positions of `carmen:addressnumber` entries matching `number`.
    pub fn address_positions(&self, number: &str) -> Vec<usize> {
        let Some(candidates) = &self.properties.addressnumber else {
            return Vec::new();
        };
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_deref().is_some_and(|c| address_matches(c, number)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Point of the `MultiPoint` geometry at `position`.
    pub fn point_at(&self, position: usize) -> Option<[f64; 2]> {
        match &self.geometry {
            Some(Geometry::MultiPoint { coordinates }) => coordinates.get(position).copied(),
            _ => None,
        }
    }
}

/// Does the address-number candidate `candidate` accept house number `number`?
///
/// Candidates are exact numbers (`"12b"`) or inclusive ranges (`"2-20"`). A
/// range whose ends share parity only accepts numbers of that parity.
pub fn address_matches(candidate: &str, number: &str) -> bool {
    let candidate = candidate.trim();
    if candidate.eq_ignore_ascii_case(number) {
        return true;
    }
    let Some((lo, hi)) = candidate.split_once('-') else {
        return false;
    };
    let (Ok(lo), Ok(hi), Ok(n)) = (lo.trim().parse::<u64>(), hi.trim().parse::<u64>(), number.parse::<u64>()) else {
        return false;
    };
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    if n < lo || n > hi {
        return false;
    }
    lo % 2 != hi % 2 || n % 2 == lo % 2
}

/// Parse a `"z/x/y"` tile string.
pub fn parse_zxy(s: &str) -> Option<(u8, u32, u32)> {
    let mut parts = s.split('/');
    let z = parts.next()?.parse().ok()?;
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((z, x, y))
}

fn rezoom((z, x, y): (u8, u32, u32), zoom: u8) -> Vec<(u32, u32)> {
    if z >= zoom {
        let shift = u32::from(z - zoom);
        return vec![(x >> shift, y >> shift)];
    }
    let shift = u32::from(zoom - z);
    let side = 1u32 << shift;
    let (bx, by) = (x << shift, y << shift);
    (bx..bx + side).flat_map(|x| (by..by + side).map(move |y| (x, y))).collect()
}

/// Web Mercator tile containing `(lon, lat)` at `zoom`.
pub fn lonlat_to_tile(lon: f64, lat: f64, zoom: u8) -> (u32, u32) {
    let n = 2.0_f64.powi(i32::from(zoom));
    let max = n - 1.0;
    let lat = lat.clamp(-MAX_LAT, MAX_LAT);
    let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, max);
    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor().clamp(0.0, max);
    (x as u32, y as u32)
}

/// `[lon, lat]` of the tile's northwest corner.
pub fn tile_to_lonlat(x: f64, y: f64, zoom: u8) -> [f64; 2] {
    let n = 2.0_f64.powi(i32::from(zoom));
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan() * 180.0 / PI;
    [lon, lat]
}

pub fn tile_center(x: u32, y: u32, zoom: u8) -> [f64; 2] {
    tile_to_lonlat(f64::from(x) + 0.5, f64::from(y) + 0.5, zoom)
}

/// Whether tile `a` at `za` and tile `b` at `zb` overlap.
pub fn tiles_overlap(a: (u32, u32), za: u8, b: (u32, u32), zb: u8) -> bool {
    if za <= zb {
        let shift = u32::from(zb - za);
        (b.0 >> shift, b.1 >> shift) == a
    } else {
        let shift = u32::from(za - zb);
        (a.0 >> shift, a.1 >> shift) == b
    }
}

/// Great-circle distance in kilometers.
pub fn haversine_km(a: [f64; 2], b: [f64; 2]) -> f64 {
    let (lat1, lat2) = (a[1].to_radians(), b[1].to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b[0] - a[0]).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

fn ring_bbox(ring: &[[f64; 2]]) -> Option<([f64; 2], [f64; 2])> {
    let first = *ring.first()?;
    Some(ring.iter().fold((first, first), |(min, max), p| {
        ([min[0].min(p[0]), min[1].min(p[1])], [max[0].max(p[0]), max[1].max(p[1])])
    }))
}

fn ring_contains(ring: &[[f64; 2]], [px, py]: [f64; 2]) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let ([xi, yi], [xj, yj]) = (ring[i], ring[j]);
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Even-odd point-in-polygon; holes exclude.
pub fn polygon_contains(rings: &[Vec<[f64; 2]>], point: [f64; 2]) -> bool {
    match rings.split_first() {
        Some((outer, holes)) => ring_contains(outer, point) && !holes.iter().any(|h| ring_contains(h, point)),
        None => false,
    }
}
