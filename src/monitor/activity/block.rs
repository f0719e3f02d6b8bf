//! Linux block device counters from `/sys/class/block/<name>/stat`.

use std::path::PathBuf;

use crate::core::errors::{FsmonError, Result};
use crate::monitor::activity::{ActivitySample, number};
use crate::monitor::context::MonitorContext;

const MIN_FIELDS: usize = 11;

pub fn stat_path(device: &str) -> PathBuf {
    PathBuf::from("/sys/class/block").join(device).join("stat")
}

pub fn read(ctx: &MonitorContext, device: &str) -> Result<ActivitySample> {
    let path = stat_path(device);
    let raw = ctx
        .platform()
        .read_text(&path)
        .map_err(|err| FsmonError::io(&path, err))?;
    parse_stat(
        &raw,
        &path.to_string_lossy(),
        ctx.sector_size(),
        ctx.now_ms(),
    )
}

/// Fields: read ios, read merges, read sectors, read ticks, write ios, write
/// merges, write sectors, write ticks, in flight, io ticks, queue ticks, ...
#[allow(clippy::cast_precision_loss)]
pub fn parse_stat(
    raw: &str,
    source: &str,
    sector_size: u64,
    timestamp_ms: u64,
) -> Result<ActivitySample> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(FsmonError::parse(
            source,
            format!("expected at least {MIN_FIELDS} fields, found {}", fields.len()),
        ));
    }
    let sector_bytes = sector_size as f64;
    Ok(ActivitySample {
        timestamp_ms,
        read_ops: Some(number(source, "read_ios", fields[0])?),
        read_bytes: Some(number(source, "read_sectors", fields[2])? * sector_bytes),
        read_time_ms: Some(number(source, "read_ticks", fields[3])?),
        write_ops: Some(number(source, "write_ios", fields[4])?),
        write_bytes: Some(number(source, "write_sectors", fields[6])? * sector_bytes),
        write_time_ms: Some(number(source, "write_ticks", fields[7])?),
        wait_time_ms: None,
        run_time_ms: None,
    })
}
