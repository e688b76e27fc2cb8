//! In-process counter storage
//!
//! The default store when no external storage URL is configured. The counter
//! map is the single point of synchronization shared across concurrent
//! requests; everything else in the pipeline is read-only.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{epoch_secs, CounterStore, StoreError, WindowCount};

#[derive(Debug, Clone, Copy)]
struct WindowSlot {
    window_id: u64,
    count: u64,
}

/// Fixed-window counters keyed by client key and window length.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    slots: RwLock<HashMap<String, WindowSlot>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str, window_secs: u64) -> Result<WindowCount, StoreError> {
        let now = epoch_secs();
        let window_id = now / window_secs;
        let slot_key = format!("{key}:{window_secs}");

        let mut slots = self.slots.write().await;
        let slot = slots.entry(slot_key).or_insert(WindowSlot {
            window_id,
            count: 0,
        });

        if slot.window_id != window_id {
            // Stale window: reset rather than carry the old count over.
            slot.window_id = window_id;
            slot.count = 0;
        }
        slot.count += 1;

        Ok(WindowCount {
            count: slot.count,
            reset_after_secs: window_secs - (now % window_secs),
        })
    }
}
