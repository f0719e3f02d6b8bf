#![forbid(unsafe_code)]

//! fsmon: filesystem usage and I/O activity monitoring.
//!
//! For each configured filesystem the monitor resolves the mount point or
//! device against the live mount table, reads capacity and inode usage, and
//! keeps rolling per-second rates of the read/write counters exposed by the
//! platform (block device stats, NFS mountstats, CIFS stats, ZFS kstats, the
//! macOS I/O Registry).
//!
//! # Library usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fsmon::prelude::*;
//!
//! # fn main() -> fsmon::prelude::Result<()> {
//! let platform = detect_platform()?;
//! let ctx = MonitorContext::new(platform, Arc::new(MonotonicClock), RunMode::Oneshot);
//! let mut monitors = MonitorSet::new();
//! monitors.push(FilesystemMonitor::by_mountpoint("/"));
//! monitors.poll_all(&ctx);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod monitor;
pub mod platform;
