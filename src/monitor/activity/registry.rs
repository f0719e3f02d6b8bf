//! macOS disk counters from the I/O Registry.
//!
//! Each read opens a short-lived [`RegistrySession`]: one snapshot of the
//! `IOBlockStorageDriver` plane as printed by `ioreg`, dropped when the read
//! returns.

use std::collections::HashMap;

use crate::core::errors::{FsmonError, Result};
use crate::monitor::activity::{ActivitySample, number};
use crate::monitor::context::MonitorContext;

const SOURCE: &str = "ioreg IOBlockStorageDriver";
const NS_PER_MS: f64 = 1_000_000.0;

/// Statistics dictionary of one block storage driver and the BSD names of
/// the media below it.
#[derive(Debug, Clone, Default, PartialEq)]
struct DriverNode {
    statistics: HashMap<String, String>,
    bsd_names: Vec<String>,
}

#[derive(Debug)]
pub struct RegistrySession {
    drivers: Vec<DriverNode>,
}

impl RegistrySession {
    pub fn open(ctx: &MonitorContext) -> Result<Self> {
        let raw = ctx
            .platform()
            .command_output("ioreg", &["-r", "-c", "IOBlockStorageDriver", "-l", "-w0"])?;
        Ok(Self::from_output(&raw))
    }

    #[must_use]
    pub fn from_output(raw: &str) -> Self {
        let mut drivers = Vec::new();
        let mut current: Option<DriverNode> = None;
        for line in raw.lines() {
            if line.contains("<class IOBlockStorageDriver") {
                drivers.extend(current.take());
                current = Some(DriverNode::default());
                continue;
            }
            let Some(node) = current.as_mut() else {
                continue;
            };
            if let Some(dict) = property(line, "Statistics") {
                node.statistics = parse_dictionary(dict);
            } else if let Some(name) = property(line, "BSD Name") {
                node.bsd_names.push(name.trim_matches('"').to_string());
            }
        }
        drivers.extend(current);
        Self { drivers }
    }

    /// Counters of the driver that carries `disk` (a whole-disk BSD name).
    pub fn statistics(&self, disk: &str, timestamp_ms: u64) -> Result<ActivitySample> {
        let node = self
            .drivers
            .iter()
            .find(|node| node.bsd_names.iter().any(|name| name == disk))
            .ok_or_else(|| FsmonError::parse(SOURCE, format!("no driver for {disk}")))?;
        let stat = |key: &str| -> Result<f64> {
            let raw = node
                .statistics
                .get(key)
                .ok_or_else(|| FsmonError::parse(SOURCE, format!("{disk}: missing {key}")))?;
            number(SOURCE, key, raw)
        };
        Ok(ActivitySample {
            timestamp_ms,
            read_bytes: Some(stat("Bytes (Read)")?),
            write_bytes: Some(stat("Bytes (Write)")?),
            read_ops: Some(stat("Operations (Read)")?),
            write_ops: Some(stat("Operations (Write)")?),
            read_time_ms: Some(stat("Total Time (Read)")? / NS_PER_MS),
            write_time_ms: Some(stat("Total Time (Write)")? / NS_PER_MS),
            wait_time_ms: None,
            run_time_ms: None,
        })
    }
}

pub fn read(ctx: &MonitorContext, disk: &str) -> Result<ActivitySample> {
    let session = RegistrySession::open(ctx)?;
    session.statistics(disk, ctx.now_ms())
}

/// Value of a `"key" = value` property line inside an `ioreg -l` listing.
fn property<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let body = line.trim_start_matches(|c: char| c == ' ' || c == '|').trim();
    let rest = body.strip_prefix('"')?.strip_prefix(key)?.strip_prefix('"')?;
    Some(rest.trim_start().strip_prefix('=')?.trim())
}

/// `{"Key"=1,"Other Key"=2}` into a map of unquoted keys.
fn parse_dictionary(raw: &str) -> HashMap<String, String> {
    raw.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().trim_matches('"').to_string(), value.trim().to_string()))
        })
        .collect()
}
