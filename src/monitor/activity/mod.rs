//! Activity probes: cumulative read/write counters from whichever statistics
//! source matches a resolved filesystem.

#![allow(missing_docs)]

pub mod block;
pub mod cifs;
pub mod iostat;
pub mod kstat;
pub mod nfs;
pub mod registry;
pub mod zfs;

use serde::Serialize;

use crate::core::errors::{FsmonError, Result};
use crate::monitor::context::MonitorContext;
use crate::monitor::resolver::{ActivityProbeKind, KstatName, ResolvedDevice};
use crate::monitor::statistic::{RollingStatistic, StatisticView};
use crate::platform::pal::Flavor;

/// One reading of a statistics source. Every value is cumulative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActivitySample {
    pub timestamp_ms: u64,
    pub read_bytes: Option<f64>,
    pub write_bytes: Option<f64>,
    pub read_ops: Option<f64>,
    pub write_ops: Option<f64>,
    pub read_time_ms: Option<f64>,
    pub write_time_ms: Option<f64>,
    pub wait_time_ms: Option<f64>,
    pub run_time_ms: Option<f64>,
}

impl ActivitySample {
    #[must_use]
    pub fn at(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }
}

/// Per-record rolling statistics fed from activity samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityCounters {
    pub read_bytes: RollingStatistic,
    pub write_bytes: RollingStatistic,
    pub read_ops: RollingStatistic,
    pub write_ops: RollingStatistic,
    pub read_time: RollingStatistic,
    pub write_time: RollingStatistic,
    pub wait_time: RollingStatistic,
    pub run_time: RollingStatistic,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ActivityView {
    pub read_bytes: StatisticView,
    pub write_bytes: StatisticView,
    pub read_ops: StatisticView,
    pub write_ops: StatisticView,
    pub read_time_ms: StatisticView,
    pub write_time_ms: StatisticView,
    pub wait_time_ms: StatisticView,
    pub run_time_ms: StatisticView,
}

impl ActivityCounters {
    pub fn apply(&mut self, sample: &ActivitySample) {
        let ts = sample.timestamp_ms;
        for (stat, value) in [
            (&mut self.read_bytes, sample.read_bytes),
            (&mut self.write_bytes, sample.write_bytes),
            (&mut self.read_ops, sample.read_ops),
            (&mut self.write_ops, sample.write_ops),
            (&mut self.read_time, sample.read_time_ms),
            (&mut self.write_time, sample.write_time_ms),
            (&mut self.wait_time, sample.wait_time_ms),
            (&mut self.run_time, sample.run_time_ms),
        ] {
            if let Some(value) = value {
                stat.update(ts, value);
            }
        }
    }

    /// Back to "no data"; distinct from zero activity.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        [
            &self.read_bytes,
            &self.write_bytes,
            &self.read_ops,
            &self.write_ops,
            &self.read_time,
            &self.write_time,
            &self.wait_time,
            &self.run_time,
        ]
        .iter()
        .any(|stat| stat.has_data())
    }

    #[must_use]
    pub fn view(&self) -> ActivityView {
        ActivityView {
            read_bytes: self.read_bytes.view(),
            write_bytes: self.write_bytes.view(),
            read_ops: self.read_ops.view(),
            write_ops: self.write_ops.view(),
            read_time_ms: self.read_time.view(),
            write_time_ms: self.write_time.view(),
            wait_time_ms: self.wait_time.view(),
            run_time_ms: self.run_time.view(),
        }
    }
}

/// Read the activity source for a resolved filesystem.
///
/// `Ok(None)` means the filesystem is mounted but has no activity data: either
/// no source exists for it, or the source does not list it yet.
pub fn read_activity(
    ctx: &MonitorContext,
    resolved: &ResolvedDevice,
) -> Result<Option<ActivitySample>> {
    let key = resolved.canonical_key.as_str();
    let flavor = ctx.platform().flavor();
    let sample = match (resolved.kind, flavor) {
        (ActivityProbeKind::Unsupported, _) => return Ok(None),
        (ActivityProbeKind::Block, Flavor::Linux) => Some(block::read(ctx, key)?),
        (ActivityProbeKind::Block, Flavor::FreeBsd) => iostat::read(ctx, key)?,
        (ActivityProbeKind::Block | ActivityProbeKind::Nfs, Flavor::Solaris) => {
            Some(kstat::read(ctx, require_kstat(resolved)?)?)
        }
        (ActivityProbeKind::Nfs, Flavor::Linux) => nfs::read(ctx, key)?,
        (ActivityProbeKind::Cifs, Flavor::Linux) => cifs::read(ctx, key)?,
        (ActivityProbeKind::Zfs, _) => zfs::read(ctx, resolved)?,
        (ActivityProbeKind::Registry, Flavor::Darwin) => Some(registry::read(ctx, key)?),
        (kind, flavor) => {
            tracing::debug!(
                "[FSM-ACTIVITY] no {kind:?} source on {}, reporting no data",
                flavor.as_str()
            );
            return Ok(None);
        }
    };
    if sample.is_none() {
        tracing::debug!(
            "[FSM-ACTIVITY] {key} not listed by its {:?} source, reporting no data",
            resolved.kind
        );
    }
    Ok(sample)
}

fn require_kstat(resolved: &ResolvedDevice) -> Result<&KstatName> {
    resolved
        .kstat
        .as_ref()
        .ok_or_else(|| FsmonError::DeviceResolution {
            path: resolved.device.clone(),
            details: "no kernel statistics address".to_string(),
        })
}

/// Parse one numeric field of a statistics source.
pub(crate) fn number(source: &str, field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|err| FsmonError::parse(source, format!("{field}={raw:?}: {err}")))
}
