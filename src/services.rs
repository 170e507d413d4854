//! Small rate-limiting services used by the narrative client. Both are
//! constructed explicitly by their owners and passed where needed, so
//! tests can build their own instances with tight limits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Common shape for usage gates: count an event, ask whether the next
/// one is allowed, and reset accumulated state.
pub trait Gate: Send + Sync {
    fn record_event(&self);
    fn should_allow(&self) -> bool;
    fn reset(&self);
}

/// Caps the number of events per process run.
pub struct QuotaGuard {
    limit: u32,
    used: AtomicU32,
}

impl QuotaGuard {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::Relaxed)
    }
}

impl Gate for QuotaGuard {
    fn record_event(&self) {
        self.used.fetch_add(1, Ordering::Relaxed);
    }

    fn should_allow(&self) -> bool {
        self.used.load(Ordering::Relaxed) < self.limit
    }

    fn reset(&self) {
        self.used.store(0, Ordering::Relaxed);
    }
}

const LATENCY_WINDOW: usize = 8;

/// Tracks recent call latencies and trips open after sustained
/// slowness or failures, so callers stop waiting on a degraded
/// upstream. `record_event` counts an outright failure; `record_sample`
/// feeds a measured duration into the window.
pub struct LatencyTracker {
    threshold: Duration,
    window: Mutex<VecDeque<Duration>>,
    failures: AtomicU32,
}

impl LatencyTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            window: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW)),
            failures: AtomicU32::new(0),
        }
    }

    pub fn record_sample(&self, elapsed: Duration) {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if window.len() == LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(elapsed);
        if elapsed < self.threshold {
            self.failures.store(0, Ordering::Relaxed);
        }
    }
}

impl Gate for LatencyTracker {
    fn record_event(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn should_allow(&self) -> bool {
        if self.failures.load(Ordering::Relaxed) >= 3 {
            return false;
        }
        let window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if window.len() < LATENCY_WINDOW {
            return true;
        }
        let slow = window.iter().filter(|d| **d >= self.threshold).count();
        slow * 2 < window.len()
    }

    fn reset(&self) {
        self.failures.store(0, Ordering::Relaxed);
        self.window
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
