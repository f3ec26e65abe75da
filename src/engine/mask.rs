//! Bitmask helpers over token positions.
//!
//! Bit `i` of a mask stands for token `i`. A valid phrase mask is one run of
//! set bits: phrases are substrings, never scattered token subsets.

/// Mask with bits `start..start + len` set.
pub fn span_mask(start: usize, len: usize) -> u32 {
    if len == 0 {
        return 0;
    }
    let ones = if len >= 32 { u32::MAX } else { (1u32 << len) - 1 };
    ones << start
}

/// Lowest and highest bit of the first run of set bits, scanning from bit 0.
///
/// Gaps are never bridged: `0b1001` yields `(0, 0)`. `None` for an empty
/// mask.
pub fn find_mask_bounds(mask: u32, max_bits: u32) -> Option<(u32, u32)> {
    let max_bits = max_bits.min(32);
    let low = (0..max_bits).find(|bit| mask & (1 << bit) != 0)?;
    let high = (low..max_bits).take_while(|bit| mask & (1 << bit) != 0).last().unwrap_or(low);
    Some((low, high))
}

/// One run of set bits, no gaps.
pub fn is_contiguous(mask: u32) -> bool {
    if mask == 0 {
        return false;
    }
    let run = mask >> mask.trailing_zeros();
    run & run.wrapping_add(1) == 0
}

/// Masks that phrase windows must treat as atomic.
///
/// `owner[i]` is the original token that replaced token `i` came from. Every
/// maximal run of replaced tokens sharing one owner, longer than one token,
/// yields the mask of that run's positions: `[0,0,1,2,3]` gives `[0b11]`.
pub fn required_masks(owner: &[usize]) -> Vec<u32> {
    let mut masks = Vec::new();
    let mut start = 0;
    while start < owner.len() {
        let end = (start..owner.len()).find(|&i| owner[i] != owner[start]).unwrap_or(owner.len());
        if end - start > 1 {
            masks.push(span_mask(start, end - start));
        }
        start = end;
    }
    masks
}

/// Mask over original positions for replaced tokens `start..start + len`.
pub fn original_mask(owner: &[usize], start: usize, len: usize) -> u32 {
    owner.iter().skip(start).take(len).fold(0, |acc, &o| acc | (1u32 << o))
}

/// `mask` covers some, but not all, of `required`.
pub fn splits(mask: u32, required: u32) -> bool {
    let shared = mask & required;
    shared != 0 && shared != required
}
