//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use fsmon::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, FilesystemTarget};
pub use crate::core::errors::{FsmonError, Result};

// Platform
pub use crate::platform::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::platform::mount_table::MountEntry;
pub use crate::platform::pal::{Flavor, MockPlatform, Platform, detect_platform};
pub use crate::platform::usage::UsageSnapshot;

// Monitor
pub use crate::monitor::activity::{ActivitySample, ActivityView};
pub use crate::monitor::context::MonitorContext;
pub use crate::monitor::filesystem::{
    FilesystemMonitor, FilesystemReport, MonitorSet, MonitorState, PollOutcome,
};
pub use crate::monitor::mount_cache::RunMode;
pub use crate::monitor::resolver::{ActivityProbeKind, DeviceResolver, MatchBy, ResolvedDevice};
pub use crate::monitor::statistic::RollingStatistic;
