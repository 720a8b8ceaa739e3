//! Clock abstraction, so tests can drive timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic-enough millisecond timestamps for templates and retargeting.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}
