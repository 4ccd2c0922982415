//! Deterministic helpers shared by unit tests across modules: a settable clock and a seeded deck.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::clock::Clock;
use crate::rules::deck::{full_deck, Card};

/// A `Clock` whose value is set explicitly, so sweeper/store/token tests never depend on
/// wall-clock timing.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Returns the 24-card deck in a fixed order, suitable as the injectable `deck` argument to
/// `deal_hand` in tests that need reproducible hands.
pub fn seeded_deck() -> Vec<Card> {
    full_deck()
}
