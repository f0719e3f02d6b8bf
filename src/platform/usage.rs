//! Space and inode usage: one native `statvfs` call per poll, normalized to a
//! single reporting block size.

#![allow(missing_docs)]

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::platform::pal::Platform;

/// `ST_RDONLY` has the same value in every statvfs ABI we target.
const ST_RDONLY: u64 = 0x1;

/// Counters exactly as returned by the native statistics call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawUsage {
    pub block_size: u64,
    pub fragment_size: u64,
    /// Block counts, in fragment units.
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
    pub flags: u64,
}

/// Which size a platform uses as its reporting block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockUnit {
    /// Report the fragment size; counts are already in that unit.
    Fragment,
    /// Report the fundamental block size; counts are rescaled from fragments.
    Block,
}

/// Usage snapshot recomputed every poll.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub block_size: u64,
    pub total_blocks: u64,
    /// Free blocks available to unprivileged users.
    pub free_blocks_available: u64,
    pub free_blocks_total: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
    pub flags: u64,
    /// Flags seen on the previous successful poll, if any.
    pub previous_flags: Option<u64>,
}

impl UsageSnapshot {
    #[must_use]
    pub fn from_raw(raw: RawUsage, unit: BlockUnit, previous_flags: Option<u64>) -> Self {
        let (block_size, scale) = match unit {
            BlockUnit::Fragment => (raw.fragment_size, 1),
            BlockUnit::Block => {
                let scale = if raw.fragment_size == 0 {
                    1
                } else {
                    (raw.block_size / raw.fragment_size).max(1)
                };
                (raw.block_size, scale)
            }
        };
        Self {
            block_size,
            total_blocks: raw.blocks / scale,
            free_blocks_available: raw.blocks_available / scale,
            free_blocks_total: raw.blocks_free / scale,
            total_inodes: raw.files,
            free_inodes: raw.files_free,
            flags: raw.flags,
            previous_flags,
        }
    }

    /// Mount flags differ from the previous poll (e.g. read-only remount).
    #[must_use]
    pub fn flags_changed(&self) -> bool {
        self.previous_flags.is_some_and(|previous| previous != self.flags)
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.flags & ST_RDONLY != 0
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_blocks.saturating_mul(self.block_size)
    }

    #[must_use]
    pub fn available_bytes(&self) -> u64 {
        self.free_blocks_available.saturating_mul(self.block_size)
    }

    /// Percentage of space in use, counting reserved blocks as used.
    #[must_use]
    pub fn space_used_pct(&self) -> f64 {
        if self.total_blocks == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            (self.total_blocks.saturating_sub(self.free_blocks_available)) as f64 * 100.0
                / self.total_blocks as f64
        }
    }

    #[must_use]
    pub fn inodes_used_pct(&self) -> f64 {
        if self.total_inodes == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            (self.total_inodes.saturating_sub(self.free_inodes)) as f64 * 100.0
                / self.total_inodes as f64
        }
    }
}

/// Read usage for a mountpoint, carrying the previous flags forward.
pub fn read_usage(
    platform: &dyn Platform,
    mountpoint: &Path,
    previous_flags: Option<u64>,
) -> Result<UsageSnapshot> {
    let raw = platform.raw_usage(mountpoint)?;
    Ok(UsageSnapshot::from_raw(
        raw,
        platform.flavor().block_unit(),
        previous_flags,
    ))
}
