//! Filesystem monitoring: device resolution, mount-table change detection,
//! per-filesystem activity probes, and the polling facade.

pub mod activity;
pub mod context;
pub mod filesystem;
pub mod io_table;
pub mod mount_cache;
pub mod resolver;
pub mod statistic;
