//! Shared state handed to every poll: platform, clock, and the caches that
//! must outlive a single filesystem record.

#![allow(missing_docs)]

use std::sync::Arc;

use crate::core::config::MonitorConfig;
use crate::monitor::io_table::IoTableCache;
use crate::monitor::mount_cache::{MountTableCache, RunMode};
use crate::platform::clock::Clock;
use crate::platform::pal::Platform;

const DEFAULT_SECTOR_SIZE: u64 = 512;
const DEFAULT_STATS_REFRESH_MS: u64 = 1_000;

pub struct MonitorContext {
    platform: Arc<dyn Platform>,
    clock: Arc<dyn Clock>,
    mount_cache: MountTableCache,
    io_tables: IoTableCache,
    mode: RunMode,
    sector_size: u64,
}

impl MonitorContext {
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, clock: Arc<dyn Clock>, mode: RunMode) -> Self {
        Self {
            platform,
            clock,
            mount_cache: MountTableCache::new(),
            io_tables: IoTableCache::new(DEFAULT_STATS_REFRESH_MS),
            mode,
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }

    #[must_use]
    pub fn from_config(
        platform: Arc<dyn Platform>,
        clock: Arc<dyn Clock>,
        mode: RunMode,
        config: &MonitorConfig,
    ) -> Self {
        Self::new(platform, clock, mode)
            .with_sector_size(config.sector_size)
            .with_stats_refresh_ms(config.stats_refresh_ms)
    }

    #[must_use]
    pub fn with_sector_size(mut self, sector_size: u64) -> Self {
        self.sector_size = sector_size;
        self
    }

    #[must_use]
    pub fn with_stats_refresh_ms(mut self, refresh_ms: u64) -> Self {
        self.io_tables = IoTableCache::new(refresh_ms);
        self
    }

    /// Run once at the start of each polling cycle, before any record polls.
    ///
    /// Returns true when a mount-table change invalidated resolved records.
    pub fn begin_cycle(&self) -> bool {
        self.mount_cache
            .invalidate_if_changed(self.platform.as_ref(), self.mode)
    }

    #[must_use]
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.mount_cache.current_generation()
    }

    #[must_use]
    pub const fn mount_cache(&self) -> &MountTableCache {
        &self.mount_cache
    }

    #[must_use]
    pub const fn io_tables(&self) -> &IoTableCache {
        &self.io_tables
    }

    #[must_use]
    pub const fn sector_size(&self) -> u64 {
        self.sector_size
    }
}
