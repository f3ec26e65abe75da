//! Total orders over verified features and assembled contexts.
//!
//! Each order is a list of comparator stages tried in sequence; the first
//! stage that tells two items apart decides. Every stage is itself a total
//! preorder (absent values sort after present ones), so the composition is
//! safe to hand to `sort_by`. Ties past the last stage keep input order.

use super::context::Context;
use crate::feature::Feature;
use std::cmp::Ordering;

pub type Stage<T> = fn(&T, &T) -> Ordering;

/// Descending, `None` last.
fn desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ascending, `None` last.
fn asc<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `true` first.
fn present_first(a: bool, b: bool) -> Ordering {
    b.cmp(&a)
}

fn run<T>(stages: &[Stage<T>], a: &T, b: &T) -> Ordering {
    stages.iter().map(|stage| stage(a, b)).find(|o| o.is_ne()).unwrap_or(Ordering::Equal)
}

// --- Features ----------------------------------------------------------------

fn feature_relevance(a: &Feature, b: &Feature) -> Ordering {
    desc(a.properties.relevance, b.properties.relevance)
}

fn feature_spatialmatch(a: &Feature, b: &Feature) -> Ordering {
    desc(a.properties.spatialmatch.map(|s| s.relev), b.properties.spatialmatch.map(|s| s.relev))
}

fn feature_address(a: &Feature, b: &Feature) -> Ordering {
    present_first(a.properties.address.is_some(), b.properties.address.is_some())
}

fn feature_geometry(a: &Feature, b: &Feature) -> Ordering {
    present_first(!a.is_omitted(), !b.is_omitted())
}

fn feature_scoredist(a: &Feature, b: &Feature) -> Ordering {
    desc(a.properties.scoredist, b.properties.scoredist)
}

fn feature_position(a: &Feature, b: &Feature) -> Ordering {
    asc(a.properties.position, b.properties.position)
}

pub const FEATURE_STAGES: &[Stage<Feature>] = &[
    feature_relevance,
    feature_spatialmatch,
    feature_address,
    feature_geometry,
    feature_scoredist,
    feature_position,
];

pub fn sort_feature(a: &Feature, b: &Feature) -> Ordering {
    run(FEATURE_STAGES, a, b)
}

// --- Contexts ----------------------------------------------------------------

fn context_relevance(a: &Context, b: &Context) -> Ordering {
    b.relevance.total_cmp(&a.relevance)
}

fn context_scoredist(a: &Context, b: &Context) -> Ordering {
    desc(a.head().and_then(|f| f.properties.scoredist), b.head().and_then(|f| f.properties.scoredist))
}

fn context_addressnumber(a: &Context, b: &Context) -> Ordering {
    let has = |c: &Context| c.head().is_some_and(|f| f.properties.addressnumber.is_some());
    present_first(has(a), has(b))
}

fn context_geometry(a: &Context, b: &Context) -> Ordering {
    let real = |c: &Context| !c.head().is_some_and(Feature::is_omitted);
    present_first(real(a), real(b))
}

fn context_typeindex(a: &Context, b: &Context) -> Ordering {
    asc(a.typeindex, b.typeindex)
}

fn context_position(a: &Context, b: &Context) -> Ordering {
    asc(a.head().and_then(|f| f.properties.position), b.head().and_then(|f| f.properties.position))
}

fn context_distance(a: &Context, b: &Context) -> Ordering {
    asc(a.distance, b.distance)
}

pub const CONTEXT_STAGES: &[Stage<Context>] = &[
    context_relevance,
    context_scoredist,
    context_addressnumber,
    context_geometry,
    context_typeindex,
    context_position,
    context_distance,
];

pub fn sort_context(a: &Context, b: &Context) -> Ordering {
    run(CONTEXT_STAGES, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::ContextMember;
    use crate::feature::{Geometry, Properties, SpatialmatchRelev};

    #[derive(Default, Clone, Copy)]
    struct F {
        relevance: Option<f64>,
        relev: Option<f64>,
        address: bool,
        omitted: bool,
        scoredist: Option<f64>,
        position: Option<usize>,
        addressnumber: bool,
    }

    fn feature(id: u32, f: F) -> Feature {
        let mut props = Properties::default();
        props.relevance = f.relevance;
        props.spatialmatch = f.relev.map(|relev| SpatialmatchRelev { relev });
        props.address = f.address.then(|| "26".to_string());
        props.scoredist = f.scoredist;
        props.position = f.position;
        props.addressnumber = f.addressnumber.then(Vec::new);
        let feature = Feature::new(id, props);
        if f.omitted { feature.with_geometry(Geometry::Omitted) } else { feature }
    }

    fn context(id: u32, relevance: f64, typeindex: Option<usize>, distance: Option<f64>, f: F) -> Context {
        Context {
            members: vec![ContextMember { ordinal: 0, feature: feature(id, f) }],
            relevance,
            distance,
            typeindex,
        }
    }

    fn sorted_ids(mut features: Vec<Feature>) -> Vec<u32> {
        features.sort_by(sort_feature);
        features.iter().map(|f| f.id).collect()
    }

    fn sorted_context_ids(mut contexts: Vec<Context>) -> Vec<u32> {
        contexts.sort_by(sort_context);
        contexts.iter().map(|c| c.members[0].feature.id).collect()
    }

    #[test]
    fn sort_feature_generic() {
        let r = Some(1.0);
        let top = F { relev: r, address: true, scoredist: Some(5.0), ..F::default() };
        let input = vec![
            feature(11, F { relev: Some(0.9), ..F::default() }),
            feature(10, F { relev: r, ..F::default() }),
            feature(9, F { relev: r, address: true, omitted: true, ..F::default() }),
            feature(8, F { relev: r, address: true, scoredist: Some(-1.0), ..F::default() }),
            feature(7, F { relev: r, address: true, scoredist: Some(2.0), ..F::default() }),
            feature(6, F { relev: r, address: true, scoredist: Some(3.0), ..F::default() }),
            feature(5, F { relev: r, address: true, scoredist: Some(4.0), position: Some(2), ..F::default() }),
            feature(4, F { relev: r, address: true, scoredist: Some(5.0), position: Some(1), ..F::default() }),
            feature(3, F { relevance: Some(0.6), position: Some(1), ..top }),
            feature(2, F { relevance: Some(0.99), relev: r, scoredist: Some(5.0), position: Some(1), ..F::default() }),
            feature(1, F { relevance: Some(1.0), position: Some(1), ..top }),
        ];
        assert_eq!(sorted_ids(input), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn sort_feature_planet_granite() {
        let f = |id: u32, relev: f64, scoredist: f64, relevance: f64| {
            feature(
                id,
                F { relevance: Some(relevance), relev: Some(relev), scoredist: Some(scoredist), ..F::default() },
            )
        };
        let input = vec![
            f(8, 1.0, 1.0, 0.6),
            f(1, 0.96, 10.999139, 0.6093304633333333),
            f(2, 0.96, 10.916823, 0.6090560766666666),
            f(3, 0.96, 10.895406, 0.6089846866666666),
            f(4, 0.96, 10.881766, 0.60893922),
            f(5, 0.96, 10.828728, 0.6087624266666666),
            f(6, 0.96, 10.774937, 0.6085831233333333),
            f(7, 0.96, 10.999999, 0.60333333),
        ];
        assert_eq!(sorted_ids(input), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn sort_context_without_distance() {
        let an = |scoredist: Option<f64>, position: Option<usize>| F {
            address: true,
            addressnumber: true,
            scoredist,
            position,
            ..F::default()
        };
        let input = vec![
            context(10, 0.9, None, None, F::default()),
            context(9, 1.0, None, None, F { address: true, ..F::default() }),
            context(8, 1.0, None, None, F { omitted: true, ..an(None, None) }),
            context(7, 1.0, None, None, an(None, None)),
            context(6, 1.0, None, None, an(Some(1.0), None)),
            context(5, 1.0, None, None, an(Some(2.0), None)),
            context(4, 1.0, Some(2), None, an(Some(2.0), None)),
            context(3, 1.0, Some(1), Some(20.0), an(Some(2.0), None)),
            context(2, 1.0, Some(1), Some(10.0), an(Some(2.0), None)),
            context(1, 1.0, Some(1), None, an(Some(2.0), Some(2))),
            context(0, 1.0, Some(1), None, an(Some(2.0), Some(1))),
        ];
        assert_eq!(sorted_context_ids(input), vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn sort_context_with_typeindex() {
        let an = |scoredist: Option<f64>| F { address: true, addressnumber: true, scoredist, ..F::default() };
        let input = vec![
            context(6, 0.9, None, None, F::default()),
            context(5, 1.0, None, None, F { address: true, ..F::default() }),
            context(4, 1.0, None, None, F { omitted: true, ..an(None) }),
            context(3, 1.0, Some(2), None, an(None)),
            context(2, 1.0, Some(1), None, an(Some(1.0))),
            context(1, 1.0, Some(1), None, an(Some(2.0))),
        ];
        assert_eq!(sorted_context_ids(input), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn sort_context_scoredist_beats_addressnumber() {
        let input = vec![
            context(3, 0.9, None, None, F::default()),
            context(2, 1.0, None, None, F { address: true, scoredist: Some(1.0), addressnumber: true, ..F::default() }),
            context(1, 1.0, None, None, F { address: true, scoredist: Some(2.0), ..F::default() }),
        ];
        assert_eq!(sorted_context_ids(input), vec![1, 2, 3]);
    }

    #[test]
    fn every_stage_is_reflexive() {
        let a = feature(1, F { relevance: Some(0.5), scoredist: Some(1.0), ..F::default() });
        for stage in FEATURE_STAGES {
            assert_eq!(stage(&a, &a), Ordering::Equal);
        }
    }
}
