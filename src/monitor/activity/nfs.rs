//! NFS client counters from Linux `/proc/self/mountstats`.

use std::path::Path;

use crate::core::errors::{FsmonError, Result};
use crate::monitor::activity::{ActivitySample, number};
use crate::monitor::context::MonitorContext;

pub const MOUNTSTATS: &str = "/proc/self/mountstats";

/// `Ok(None)` when the kernel lists no block for `device`.
pub fn read(ctx: &MonitorContext, device: &str) -> Result<Option<ActivitySample>> {
    let raw = ctx
        .platform()
        .read_text(Path::new(MOUNTSTATS))
        .map_err(|err| FsmonError::io(MOUNTSTATS, err))?;
    parse_mountstats(&raw, device, ctx.now_ms())
}

/// Per-op columns after the name: ops, transmissions, timeouts, bytes sent,
/// bytes received, queue time, rtt, execute time (microseconds).
pub fn parse_mountstats(
    raw: &str,
    device: &str,
    timestamp_ms: u64,
) -> Result<Option<ActivitySample>> {
    let header = format!("device {device} ");
    let mut lines = raw.lines().skip_while(|line| !line.starts_with(&header));
    if lines.next().is_none() {
        return Ok(None);
    }

    let mut sample = ActivitySample::at(timestamp_ms);
    let mut seen_read = false;
    for line in lines {
        if line.starts_with("device ") {
            break;
        }
        let Some((name, values)) = line.trim().split_once(':') else {
            continue;
        };
        if name != "READ" && name != "WRITE" {
            continue;
        }
        let columns: Vec<&str> = values.split_whitespace().collect();
        if columns.len() < 8 {
            return Err(FsmonError::parse(
                MOUNTSTATS,
                format!("{name} line has {} columns", columns.len()),
            ));
        }
        let ops = number(MOUNTSTATS, "ops", columns[0])?;
        let execute_ms = number(MOUNTSTATS, "execute", columns[7])? / 1000.0;
        if name == "READ" {
            sample.read_ops = Some(ops);
            sample.read_bytes = Some(number(MOUNTSTATS, "bytes_recv", columns[4])?);
            sample.read_time_ms = Some(execute_ms);
            seen_read = true;
        } else {
            sample.write_ops = Some(ops);
            sample.write_bytes = Some(number(MOUNTSTATS, "bytes_sent", columns[3])?);
            sample.write_time_ms = Some(execute_ms);
            break;
        }
    }

    if !seen_read && sample.write_ops.is_none() {
        return Err(FsmonError::parse(
            MOUNTSTATS,
            format!("device {device} has no READ/WRITE statistics"),
        ));
    }
    Ok(Some(sample))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTSTATS_SAMPLE: &str = "\
device rootfs mounted on / with fstype rootfs
device server:/export mounted on /mnt/nfs with fstype nfs4 statvers=1.1
\topts:\trw,vers=4.2,rsize=1048576,wsize=1048576
\tage:\t8123
\tbytes:\t1000 2000 0 0 1000 2000 1 1
\tper-op statistics
\t        NULL: 1 1 0 44 24 0 0 0 0
\t        READ: 120 120 0 17280 52428800 15 3200 4100000 0
\t       WRITE: 40 40 0 20971520 6400 2 900 2500000 0
\t      COMMIT: 2 2 0 280 240 0 3 3 0
device other:/vol mounted on /mnt/other with fstype nfs statvers=1.1
\tper-op statistics
\t        READ: 9 9 0 1 999 0 0 9000 0
";

    #[test]
    fn reads_read_and_write_ops_for_device() {
        let sample = parse_mountstats(MOUNTSTATS_SAMPLE, "server:/export", 7)
            .expect("parse")
            .expect("device block");
        assert_eq!(sample.timestamp_ms, 7);
        assert_eq!(sample.read_ops, Some(120.0));
        assert_eq!(sample.read_bytes, Some(52_428_800.0));
        assert_eq!(sample.read_time_ms, Some(4_100.0));
        assert_eq!(sample.write_ops, Some(40.0));
        assert_eq!(sample.write_bytes, Some(20_971_520.0));
        assert_eq!(sample.write_time_ms, Some(2_500.0));
    }

    #[test]
    fn stops_at_next_device_block() {
        let sample = parse_mountstats(MOUNTSTATS_SAMPLE, "other:/vol", 0)
            .expect("parse")
            .expect("device block");
        assert_eq!(sample.read_bytes, Some(999.0));
        assert_eq!(sample.write_bytes, None);
    }

    #[test]
    fn key_must_match_whole_device_name() {
        let sample = parse_mountstats(MOUNTSTATS_SAMPLE, "server:/exp", 0).expect("prefix only");
        assert_eq!(sample, None);
    }

    #[test]
    fn device_without_block_has_no_data() {
        let sample = parse_mountstats(MOUNTSTATS_SAMPLE, "late:/mount", 0).expect("absent");
        assert!(sample.is_none());
    }

    #[test]
    fn malformed_op_line_is_still_an_error() {
        let raw = "device a:/b mounted on /b with fstype nfs statvers=1.1\n\t READ: 1 2 3\n";
        let err = parse_mountstats(raw, "a:/b", 0).expect_err("short READ line");
        assert_eq!(err.code(), "FSM-2005");
    }

    #[test]
    fn device_without_op_lines_is_an_error() {
        let raw = "device a:/b mounted on /b with fstype nfs statvers=1.1\n\tage:\t1\n";
        assert!(parse_mountstats(raw, "a:/b", 0).is_err());
    }
}
