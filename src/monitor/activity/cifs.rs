//! SMB/CIFS share counters from Linux `/proc/fs/cifs/Stats`.

use std::path::Path;

use crate::core::errors::{FsmonError, Result};
use crate::monitor::activity::{ActivitySample, number};
use crate::monitor::context::MonitorContext;

pub const CIFS_STATS: &str = "/proc/fs/cifs/Stats";

pub fn read(ctx: &MonitorContext, share: &str) -> Result<Option<ActivitySample>> {
    let raw = ctx
        .platform()
        .read_text(Path::new(CIFS_STATS))
        .map_err(|err| FsmonError::io(CIFS_STATS, err))?;
    parse_stats(&raw, share, ctx.now_ms())
}

/// `N) \\server\share` header for a share, if `line` is one.
fn share_header(line: &str) -> Option<&str> {
    let (index, rest) = line.trim().split_once(')')?;
    index.trim().parse::<u32>().ok()?;
    rest.split_whitespace().next()
}

/// `Ok(None)` when no block is listed for `share`.
pub fn parse_stats(raw: &str, share: &str, timestamp_ms: u64) -> Result<Option<ActivitySample>> {
    let mut lines = raw.lines().skip_while(|line| share_header(line) != Some(share));
    if lines.next().is_none() {
        return Ok(None);
    }

    let mut sample = ActivitySample::at(timestamp_ms);
    for line in lines {
        if share_header(line).is_some() {
            break;
        }
        // `Reads:  <ops> Bytes: <n>` / `Writes: <ops> Bytes: <n>`
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [label, ops, "Bytes:", bytes, ..] = tokens.as_slice() else {
            continue;
        };
        match *label {
            "Reads:" => {
                sample.read_ops = Some(number(CIFS_STATS, "reads", ops)?);
                sample.read_bytes = Some(number(CIFS_STATS, "read bytes", bytes)?);
            }
            "Writes:" => {
                sample.write_ops = Some(number(CIFS_STATS, "writes", ops)?);
                sample.write_bytes = Some(number(CIFS_STATS, "write bytes", bytes)?);
                break;
            }
            _ => {}
        }
    }
    Ok(Some(sample))
}
