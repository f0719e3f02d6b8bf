//! FreeBSD device counters from the system-wide I/O table (`iostat -x -I`),
//! shared between filesystems through the context's `IoTableCache`.

use std::collections::HashMap;

use crate::core::errors::{FsmonError, Result};
use crate::monitor::activity::{ActivitySample, number};
use crate::monitor::context::MonitorContext;
use crate::monitor::io_table::IoRow;

const SOURCE: &str = "iostat -x -I";
const KIB: f64 = 1024.0;

/// `Ok(None)` when the table has no row for `device`.
pub fn read(ctx: &MonitorContext, device: &str) -> Result<Option<ActivitySample>> {
    let snapshot = ctx.io_tables().get_or_refresh(ctx.now_ms(), || {
        let raw = ctx.platform().command_output("iostat", &["-x", "-I"])?;
        parse_table(&raw)
    })?;
    let Some(row) = snapshot.row(device) else {
        return Ok(None);
    };
    Ok(Some(ActivitySample {
        timestamp_ms: snapshot.taken_at_ms,
        read_bytes: Some(row.read_bytes),
        write_bytes: Some(row.write_bytes),
        read_ops: Some(row.read_ops),
        write_ops: Some(row.write_ops),
        run_time_ms: row.run_time_ms,
        ..ActivitySample::default()
    }))
}

/// Parse the header-driven table; columns are located by name so extra or
/// reordered columns across releases do not matter.
pub fn parse_table(raw: &str) -> Result<HashMap<String, IoRow>> {
    let mut lines = raw.lines().skip_while(|line| {
        line.split_whitespace()
            .next()
            .is_none_or(|first| first != "device")
    });
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| FsmonError::parse(SOURCE, "no device header"))?
        .split_whitespace()
        .collect();
    let column = |name: &str| header.iter().position(|col| *col == name);
    let required = |name: &str| {
        column(name).ok_or_else(|| FsmonError::parse(SOURCE, format!("no {name} column")))
    };
    let reads = required("r/i")?;
    let writes = required("w/i")?;
    let kread = required("kr/i")?;
    let kwritten = required("kw/i")?;
    let service = column("tsvc_t/i");

    let mut rows = HashMap::new();
    for line in lines {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < header.len() {
            continue;
        }
        let value = |idx: usize, name: &str| number(SOURCE, name, cols[idx]);
        rows.insert(
            cols[0].to_string(),
            IoRow {
                read_ops: value(reads, "r/i")?,
                write_ops: value(writes, "w/i")?,
                read_bytes: value(kread, "kr/i")? * KIB,
                write_bytes: value(kwritten, "kw/i")? * KIB,
                // Total service time is reported in seconds.
                run_time_ms: service
                    .map(|idx| value(idx, "tsvc_t/i").map(|secs| secs * 1000.0))
                    .transpose()?,
            },
        );
    }
    Ok(rows)
}
