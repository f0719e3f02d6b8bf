//! Shared snapshot of a whole-system I/O statistics table.
//!
//! Some kernels only publish device statistics as one table covering every
//! disk. Reading it once per refresh interval and sharing the result keeps a
//! cycle over many filesystems from re-running the same collection.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::Result;

/// One device row of the system I/O table, cumulative since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IoRow {
    pub read_bytes: f64,
    pub write_bytes: f64,
    pub read_ops: f64,
    pub write_ops: f64,
    /// Total busy (service) time in milliseconds, when the table carries it.
    pub run_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct IoTableSnapshot {
    pub taken_at_ms: u64,
    pub rows: HashMap<String, IoRow>,
}

impl IoTableSnapshot {
    #[must_use]
    pub fn row(&self, device: &str) -> Option<&IoRow> {
        self.rows.get(device)
    }
}

#[derive(Debug)]
pub struct IoTableCache {
    refresh_ms: u64,
    current: Mutex<Option<Arc<IoTableSnapshot>>>,
}

impl IoTableCache {
    #[must_use]
    pub fn new(refresh_ms: u64) -> Self {
        Self {
            refresh_ms: refresh_ms.max(1),
            current: Mutex::new(None),
        }
    }

    /// Return the cached table, reloading it when it is older than the refresh
    /// interval or the clock has jumped back by more than that interval.
    ///
    /// A failed load leaves the previous snapshot in place for later callers.
    pub fn get_or_refresh<F>(&self, now_ms: u64, load: F) -> Result<Arc<IoTableSnapshot>>
    where
        F: FnOnce() -> Result<HashMap<String, IoRow>>,
    {
        let mut current = self.current.lock();
        if let Some(snapshot) = current.as_ref()
            && self.is_fresh(snapshot.taken_at_ms, now_ms)
        {
            return Ok(Arc::clone(snapshot));
        }

        let snapshot = Arc::new(IoTableSnapshot {
            taken_at_ms: now_ms,
            rows: load()?,
        });
        tracing::debug!(
            "[FSM-IOTABLE] refreshed system I/O table ({} devices)",
            snapshot.rows.len()
        );
        *current = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    fn is_fresh(&self, taken_at_ms: u64, now_ms: u64) -> bool {
        now_ms < taken_at_ms.saturating_add(self.refresh_ms)
            && now_ms.saturating_add(self.refresh_ms) >= taken_at_ms
    }

    pub fn clear(&self) {
        *self.current.lock() = None;
    }
}
