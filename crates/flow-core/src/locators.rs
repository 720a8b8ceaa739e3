//! Sync locator and inventory helpers.
//!
//! A locator is a per-chain skip list of hashes along the canonical path:
//! the tip, then heights at exponentially increasing gaps below it, always
//! ending at genesis. A peer answers with per-chain inventories: the hashes
//! above the first locator entry it recognizes, oldest first, bounded per
//! chain.

/// Upper bound on hashes returned per chain in one inventory.
pub const MAX_INVENTORY_PER_CHAIN: usize = 128;

/// The heights sampled by a locator for a chain whose tip is at
/// `tip_height`: `tip, tip−1, tip−2, tip−4, …, 0`.
pub fn locator_heights(tip_height: u64) -> Vec<u64> {
    let mut heights = Vec::new();
    let mut gap = 1u64;
    let mut cursor = tip_height;
    heights.push(cursor);
    while cursor > 0 {
        cursor = cursor.saturating_sub(gap);
        heights.push(cursor);
        gap = gap.saturating_mul(2);
    }
    heights
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_heights_shape() {
        assert_eq!(locator_heights(0), vec![0]);
        assert_eq!(locator_heights(1), vec![1, 0]);
        assert_eq!(locator_heights(10), vec![10, 9, 7, 3, 0]);
        assert_eq!(locator_heights(100), vec![100, 99, 97, 93, 85, 69, 37, 0]);
    }

    #[test]
    fn test_locator_always_ends_at_genesis() {
        for tip in [0u64, 1, 5, 1_000, 1_000_000] {
            let heights = locator_heights(tip);
            assert_eq!(*heights.first().unwrap(), tip);
            assert_eq!(*heights.last().unwrap(), 0);
            // strictly descending
            assert!(heights.windows(2).all(|w| w[0] > w[1] || (w[0] == 0 && w[1] == 0)));
        }
    }

    #[test]
    fn test_locator_is_logarithmic() {
        assert!(locator_heights(1 << 40).len() < 64);
    }
}
