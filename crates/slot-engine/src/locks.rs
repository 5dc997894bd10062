//! Per-slot serialization for check-then-write mutations.
//!
//! Blocking a slot reads the day, decides the slot is free, then inserts. Two
//! callers doing that concurrently on one slot would both insert, so each
//! mutation runs while holding a mutex keyed by (date, time). Unrelated slots
//! never contend. Entries are dropped once no caller holds them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::grid::SlotTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: SlotTime,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time: SlotTime) -> Self {
        Self { date, time }
    }
}

#[derive(Debug, Default)]
pub struct SlotLocks {
    table: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_slot<T>(&self, key: SlotKey, f: impl FnOnce() -> T) -> T {
        let slot = Arc::clone(self.table.lock().entry(key).or_default());

        let result = {
            let _guard = slot.lock();
            f()
        };

        // One reference in the table plus ours means nobody else is waiting.
        let mut table = self.table.lock();
        if Arc::strong_count(&slot) == 2 {
            table.remove(&key);
        }
        result
    }

    /// Number of slots with a live lock entry.
    pub fn active(&self) -> usize {
        self.table.lock().len()
    }
}
