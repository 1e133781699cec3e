//! # rr-counter-memory
//!
//! In-process `WindowCounter` for single-node deployments and tests.
//! Each content item owns a slot in a sharded map; the shard lock held by the
//! entry API makes reset-check-increment one atomic step per key.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rr_core::clock::{Clock, SystemClock};
use rr_core::error::Result;
use rr_core::models::ContentId;
use rr_core::traits::{WindowCounter, WindowMode};
use tracing::debug;

/// Expired slots are swept once the map grows past this many keys. After a
/// sweep the next one waits until the surviving key count has doubled.
const DEFAULT_SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Slot {
    count: u64,
    expires_at: DateTime<Utc>,
}

impl Slot {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

pub struct MemoryWindowCounter {
    slots: DashMap<ContentId, Slot>,
    window: Duration,
    mode: WindowMode,
    clock: Arc<dyn Clock>,
    sweep_threshold: usize,
    next_sweep_at: AtomicUsize,
}

impl MemoryWindowCounter {
    pub fn new(window: Duration, mode: WindowMode) -> Self {
        Self::with_clock(window, mode, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, mode: WindowMode, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: DashMap::new(),
            window,
            mode,
            clock,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            next_sweep_at: AtomicUsize::new(DEFAULT_SWEEP_THRESHOLD),
        }
    }

    pub fn with_sweep_threshold(mut self, keys: usize) -> Self {
        self.sweep_threshold = keys;
        self.next_sweep_at = AtomicUsize::new(keys);
        self
    }

    /// Number of keys currently held, live or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drops every expired slot.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.is_live(now));
        let after = self.slots.len();
        self.next_sweep_at.store(
            self.sweep_threshold.max(after.saturating_mul(2)),
            Ordering::Relaxed,
        );
        debug!(removed = before.saturating_sub(after), remaining = after, "swept expired window slots");
    }
}

#[async_trait]
impl WindowCounter for MemoryWindowCounter {
    async fn increment(&self, content_id: ContentId) -> Result<u64> {
        let now = self.clock.now();
        let fresh = Slot {
            count: 0,
            expires_at: now + self.window,
        };

        let count = {
            let mut slot = self.slots.entry(content_id).or_insert(fresh);
            if !slot.is_live(now) {
                *slot = fresh;
            }
            slot.count += 1;
            if self.mode == WindowMode::Sliding {
                slot.expires_at = now + self.window;
            }
            slot.count
        };

        if self.slots.len() > self.next_sweep_at.load(Ordering::Relaxed) {
            self.sweep(now);
        }
        Ok(count)
    }

    async fn get(&self, content_id: ContentId) -> Result<u64> {
        let now = self.clock.now();
        Ok(self
            .slots
            .get(&content_id)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.count)
            .unwrap_or(0))
    }
}
