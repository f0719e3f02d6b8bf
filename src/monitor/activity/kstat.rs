//! Kernel I/O statistics in the `kstat_io` layout, as printed by Solaris
//! `kstat -p` and by the OpenZFS SPL `/proc/spl/kstat` tables on Linux.

use std::collections::HashMap;

use crate::core::errors::{FsmonError, Result};
use crate::monitor::activity::{ActivitySample, number};
use crate::monitor::context::MonitorContext;
use crate::monitor::resolver::KstatName;

const NS_PER_MS: f64 = 1_000_000.0;

/// Read an I/O kstat through the `kstat(1M)` utility.
pub fn read(ctx: &MonitorContext, name: &KstatName) -> Result<ActivitySample> {
    let instance = name.instance.to_string();
    let args = [
        "-p",
        "-m",
        name.module.as_str(),
        "-i",
        instance.as_str(),
        "-n",
        name.name.as_str(),
    ];
    let raw = ctx.platform().command_output("kstat", &args)?;
    let source = format!("kstat {}:{}:{}", name.module, name.instance, name.name);
    let fields = parse_parseable(&raw);
    io_sample(&fields, &source, ctx.now_ms())
}

/// `module:instance:name:statistic<TAB>value` lines into a statistic map.
pub fn parse_parseable(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(char::is_whitespace)?;
            let (_, statistic) = key.rsplit_once(':')?;
            Some((statistic.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// SPL raw kstat: a header line, a row of column names, a row of values.
pub fn parse_spl_io(raw: &str) -> Option<HashMap<String, String>> {
    let mut lines = raw.lines().skip_while(|line| !line.trim_start().starts_with("nread"));
    let names = lines.next()?;
    let values = lines.next()?;
    Some(
        names
            .split_whitespace()
            .zip(values.split_whitespace())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    )
}

/// Build a sample from `nread nwritten reads writes wtime rtime`.
pub fn io_sample(
    fields: &HashMap<String, String>,
    source: &str,
    timestamp_ms: u64,
) -> Result<ActivitySample> {
    let field = |name: &str| -> Result<f64> {
        let raw = fields
            .get(name)
            .ok_or_else(|| FsmonError::parse(source, format!("missing {name}")))?;
        number(source, name, raw)
    };
    let optional = |name: &str| -> Result<Option<f64>> {
        fields
            .get(name)
            .map(|raw| number(source, name, raw))
            .transpose()
    };
    Ok(ActivitySample {
        timestamp_ms,
        read_bytes: Some(field("nread")?),
        write_bytes: Some(field("nwritten")?),
        read_ops: Some(field("reads")?),
        write_ops: Some(field("writes")?),
        read_time_ms: None,
        write_time_ms: None,
        wait_time_ms: optional("wtime")?.map(|ns| ns / NS_PER_MS),
        run_time_ms: optional("rtime")?.map(|ns| ns / NS_PER_MS),
    })
}
