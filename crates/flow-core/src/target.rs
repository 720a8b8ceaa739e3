//! Difficulty retargeting.
//!
//! The exact formula is a per-network choice, so the flow handler talks to
//! a [`TargetAdjustment`] strategy object. The strategy shipped here scales
//! the previous target by the ratio of the observed mean block interval to
//! the expected interval over a sliding window, clamped to a factor of two
//! per step. The caller additionally clamps the result into the
//! `[difficulty floor, max target]` band.

use flow_types::U256;

/// A recent header's contribution to retargeting.
#[derive(Clone, Debug)]
pub struct TargetSample {
    pub timestamp_ms: u64,
    pub target: U256,
}

/// Strategy interface for computing the next mining target of a chain.
pub trait TargetAdjustment: Send + Sync {
    /// Compute the next target from recent canonical-path headers, oldest
    /// first. `samples` may be shorter than the window near genesis.
    fn next_target(&self, samples: &[TargetSample]) -> U256;
}

/// Sliding-window arithmetic mean over inter-block intervals.
pub struct WindowedMeanAdjustment {
    expected_interval_ms: u64,
    window: usize,
}

/// Largest single-step adjustment factor, up or down.
const MAX_ADJUST_FACTOR: u64 = 2;

impl WindowedMeanAdjustment {
    pub fn new(expected_interval_ms: u64, window: usize) -> Self {
        Self {
            expected_interval_ms,
            window: window.max(2),
        }
    }
}

impl TargetAdjustment for WindowedMeanAdjustment {
    fn next_target(&self, samples: &[TargetSample]) -> U256 {
        let Some(last) = samples.last() else {
            return U256::max_value();
        };
        if samples.len() < 2 {
            return last.target.clone();
        }

        let window = &samples[samples.len().saturating_sub(self.window)..];
        let first = &window[0];
        let span_ms = window
            .last()
            .expect("window non-empty")
            .timestamp_ms
            .saturating_sub(first.timestamp_ms);
        let intervals = (window.len() - 1) as u64;
        let actual_mean = span_ms / intervals.max(1);
        let expected = self.expected_interval_ms.max(1);

        // Faster blocks than expected shrink the target, slower grow it.
        let (num, den) = (
            actual_mean.clamp(expected / MAX_ADJUST_FACTOR, expected * MAX_ADJUST_FACTOR),
            expected,
        );
        last.target.scale(num.max(1), den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(interval_ms: u64, count: usize, target: U256) -> Vec<TargetSample> {
        (0..count)
            .map(|i| TargetSample {
                timestamp_ms: i as u64 * interval_ms,
                target: target.clone(),
            })
            .collect()
    }

    #[test]
    fn test_on_pace_keeps_target() {
        let adj = WindowedMeanAdjustment::new(1_000, 16);
        let target = U256::from_u64(1 << 40);
        let next = adj.next_target(&samples(1_000, 16, target.clone()));
        assert_eq!(next, target);
    }

    #[test]
    fn test_fast_blocks_shrink_target() {
        let adj = WindowedMeanAdjustment::new(1_000, 16);
        let target = U256::from_u64(1 << 40);
        let next = adj.next_target(&samples(500, 16, target.clone()));
        assert!(next < target);
        // clamped to at most halving
        assert!(next >= target.scale(1, 2));
    }

    #[test]
    fn test_slow_blocks_grow_target() {
        let adj = WindowedMeanAdjustment::new(1_000, 16);
        let target = U256::from_u64(1 << 40);
        let next = adj.next_target(&samples(4_000, 16, target.clone()));
        // clamped to at most doubling
        assert_eq!(next, target.scale(2, 1));
    }

    #[test]
    fn test_short_history_passes_through() {
        let adj = WindowedMeanAdjustment::new(1_000, 16);
        let target = U256::from_u64(99);
        assert_eq!(adj.next_target(&samples(1_000, 1, target.clone())), target);
        assert_eq!(adj.next_target(&[]), U256::max_value());
    }
}
