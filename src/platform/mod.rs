//! Platform abstraction: mount tables, `statvfs`, clocks, and the OS trait.

pub mod clock;
pub mod mount_table;
pub mod pal;
pub mod usage;
