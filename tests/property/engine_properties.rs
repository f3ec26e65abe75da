use proptest::prelude::*;
use tessera::TmpId;
use tessera::engine::mask::{find_mask_bounds, is_contiguous, original_mask, required_masks, span_mask, splits};
use tessera::engine::{FEATURE_ID_MASK, MAX_SOURCES};
use tessera::text::MAX_QUERY_TOKENS;

/// Non-decreasing owner mappings: each original token becomes 0..=3 tokens.
fn owner_mapping() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..=3, 1..8).prop_map(|counts| {
        counts.iter().enumerate().flat_map(|(idx, &n)| std::iter::repeat_n(idx, n)).collect::<Vec<_>>()
    })
}

proptest! {
    #[test]
    fn span_masks_are_contiguous(start in 0usize..MAX_QUERY_TOKENS, len in 1usize..=MAX_QUERY_TOKENS) {
        prop_assume!(start + len <= MAX_QUERY_TOKENS);
        let mask = span_mask(start, len);
        prop_assert!(is_contiguous(mask));
        prop_assert_eq!(mask.count_ones() as usize, len);
        prop_assert_eq!(find_mask_bounds(mask, 32), Some((start as u32, (start + len - 1) as u32)));
    }

    #[test]
    fn masks_with_a_gap_are_not_contiguous(a in 0u32..10, gap in 1u32..5, b in 1u32..5) {
        let low = span_mask(a as usize, 1);
        let high = span_mask((a + 1 + gap) as usize, b as usize);
        prop_assert!(!is_contiguous(low | high));
    }

    #[test]
    fn required_masks_cover_shared_owners(owner in owner_mapping()) {
        for mask in required_masks(&owner) {
            prop_assert!(is_contiguous(mask));
            prop_assert!(mask.count_ones() > 1);
            let (low, high) = find_mask_bounds(mask, 32).unwrap();
            let owners: Vec<usize> = (low..=high).map(|i| owner[i as usize]).collect();
            prop_assert!(owners.windows(2).all(|w| w[0] == w[1]));
        }
    }

    #[test]
    fn windows_that_respect_required_masks_map_to_original_runs(owner in owner_mapping()) {
        let required = required_masks(&owner);
        let n = owner.len();
        for len in 1..=n {
            for start in 0..=n - len {
                let span = span_mask(start, len);
                if required.iter().any(|&r| splits(span, r)) {
                    continue;
                }
                let mask = original_mask(&owner, start, len);
                prop_assert!(mask.count_ones() as usize <= len);
                prop_assert!(mask != 0);
            }
        }
    }

    #[test]
    fn tmpid_round_trips_inside_the_limits(ordinal in 0usize..MAX_SOURCES, id in 1u32..=FEATURE_ID_MASK) {
        let tmpid = TmpId::encode(ordinal, id);
        prop_assert_eq!(tmpid.decode(), (ordinal as u8, id));
        prop_assert_eq!(tmpid.get(), ((ordinal as u32) << 24) | id);
    }

    #[test]
    fn tmpid_ordinal_wraps_past_the_limit(ordinal in MAX_SOURCES..4 * MAX_SOURCES, id in 1u32..=FEATURE_ID_MASK) {
        prop_assert_eq!(TmpId::encode(ordinal, id), TmpId::encode(ordinal % MAX_SOURCES, id));
    }

    #[test]
    fn tmpid_order_follows_ordinal_then_id(
        a in 0usize..MAX_SOURCES,
        b in 0usize..MAX_SOURCES,
        x in 1u32..1000,
        y in 1u32..1000,
    ) {
        let (ta, tb) = (TmpId::encode(a, x), TmpId::encode(b, y));
        prop_assert_eq!(ta.cmp(&tb), (a, x).cmp(&(b, y)));
    }
}
