//! Filesystem monitor facade: resolve, read usage, read activity, once per
//! poll, per configured filesystem.

#![allow(missing_docs)]

use std::path::Path;

use serde::Serialize;

use crate::core::config::FilesystemTarget;
use crate::monitor::activity::{ActivityCounters, ActivityView, read_activity};
use crate::monitor::context::MonitorContext;
use crate::monitor::resolver::{ActivityProbeKind, DeviceResolver, MatchBy, ResolvedDevice};
use crate::platform::usage::{UsageSnapshot, read_usage};

/// Where a record sits in its resolution life cycle.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum MonitorState {
    Unresolved,
    Resolved { mounted: bool },
    /// Resolved under an older mount-table generation.
    Stale,
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PollOutcome {
    pub success: bool,
    pub mounted: bool,
}

impl PollOutcome {
    const fn failed(mounted: bool) -> Self {
        Self {
            success: false,
            mounted,
        }
    }
}

/// What is known about one monitored filesystem.
///
/// `mounted` implies `resolved` is present and was derived from the mount
/// table of generation `cache_generation`. Generation 0 means "resolve on
/// the next poll".
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FilesystemRecord {
    pub query: String,
    pub match_by: MatchBy,
    pub resolved: Option<ResolvedDevice>,
    pub mounted: bool,
    pub cache_generation: u64,
}

impl FilesystemRecord {
    #[must_use]
    pub fn mountpoint(&self) -> Option<&Path> {
        self.resolved.as_ref().map(|dev| dev.mountpoint.as_path())
    }

    #[must_use]
    pub fn kind(&self) -> Option<ActivityProbeKind> {
        self.resolved.as_ref().map(|dev| dev.kind)
    }
}

/// Serializable per-poll report.
#[derive(Debug, Clone, Serialize)]
pub struct FilesystemReport {
    pub record: FilesystemRecord,
    pub state: MonitorState,
    pub usage: Option<UsageSnapshot>,
    pub activity: ActivityView,
}

#[derive(Debug, Clone)]
pub struct FilesystemMonitor {
    record: FilesystemRecord,
    usage: Option<UsageSnapshot>,
    counters: ActivityCounters,
    resolve_attempted: bool,
}

impl FilesystemMonitor {
    #[must_use]
    pub fn new(query: impl Into<String>, match_by: MatchBy) -> Self {
        Self {
            record: FilesystemRecord {
                query: query.into(),
                match_by,
                resolved: None,
                mounted: false,
                cache_generation: 0,
            },
            usage: None,
            counters: ActivityCounters::default(),
            resolve_attempted: false,
        }
    }

    #[must_use]
    pub fn by_mountpoint(path: impl Into<String>) -> Self {
        Self::new(path, MatchBy::Mountpoint)
    }

    #[must_use]
    pub fn by_device(device: impl Into<String>) -> Self {
        Self::new(device, MatchBy::Device)
    }

    #[must_use]
    pub fn from_target(target: &FilesystemTarget) -> Self {
        Self::new(target.path.clone(), target.match_by)
    }

    #[must_use]
    pub const fn record(&self) -> &FilesystemRecord {
        &self.record
    }

    #[must_use]
    pub const fn usage(&self) -> Option<&UsageSnapshot> {
        self.usage.as_ref()
    }

    #[must_use]
    pub const fn activity(&self) -> &ActivityCounters {
        &self.counters
    }

    #[must_use]
    pub fn state(&self, ctx: &MonitorContext) -> MonitorState {
        if self.record.cache_generation == 0 {
            if self.resolve_attempted {
                MonitorState::Resolved { mounted: false }
            } else {
                MonitorState::Unresolved
            }
        } else if self.record.cache_generation != ctx.current_generation() {
            MonitorState::Stale
        } else {
            MonitorState::Resolved {
                mounted: self.record.mounted,
            }
        }
    }

    #[must_use]
    pub fn report(&self, ctx: &MonitorContext) -> FilesystemReport {
        FilesystemReport {
            record: self.record.clone(),
            state: self.state(ctx),
            usage: self.usage,
            activity: self.counters.view(),
        }
    }

    /// Poll once. Success requires both usage and activity reads to succeed.
    pub fn poll(&mut self, ctx: &MonitorContext) -> PollOutcome {
        let generation = ctx.current_generation();
        if self.record.cache_generation != generation
            && let Err(outcome) = self.resolve(ctx, generation)
        {
            return outcome;
        }
        let Some(resolved) = self.record.resolved.as_ref() else {
            self.counters.reset();
            return PollOutcome::failed(false);
        };

        let previous_flags = self.usage.map(|usage| usage.flags);
        match read_usage(ctx.platform(), &resolved.mountpoint, previous_flags) {
            Ok(snapshot) => {
                if snapshot.flags_changed() {
                    tracing::warn!(
                        "[FSM-USAGE] mount flags of {} changed from {:#x} to {:#x}",
                        resolved.mountpoint.display(),
                        previous_flags.unwrap_or_default(),
                        snapshot.flags
                    );
                }
                self.usage = Some(snapshot);
            }
            Err(err) => {
                tracing::error!("{err}");
                return PollOutcome::failed(true);
            }
        }

        match read_activity(ctx, resolved) {
            Ok(Some(sample)) => self.counters.apply(&sample),
            Ok(None) => self.counters.reset(),
            Err(err) => {
                tracing::error!(
                    "{err} -- activity of {} unavailable",
                    resolved.mountpoint.display()
                );
                self.counters.reset();
                return PollOutcome::failed(true);
            }
        }

        PollOutcome {
            success: true,
            mounted: true,
        }
    }

    fn resolve(&mut self, ctx: &MonitorContext, generation: u64) -> Result<(), PollOutcome> {
        self.resolve_attempted = true;
        let resolver = DeviceResolver::new(ctx.platform());
        match resolver.resolve(&self.record.query, self.record.match_by) {
            Ok(resolved) => {
                let same_source = self.record.resolved.as_ref().is_some_and(|previous| {
                    previous.canonical_key == resolved.canonical_key
                        && previous.kind == resolved.kind
                });
                if !same_source {
                    self.counters.reset();
                }
                self.record.resolved = Some(resolved);
                self.record.mounted = true;
                self.record.cache_generation = generation;
                Ok(())
            }
            Err(err) => {
                tracing::error!("{err}");
                self.record.resolved = None;
                self.record.mounted = false;
                self.record.cache_generation = 0;
                self.usage = None;
                self.counters.reset();
                Err(PollOutcome::failed(false))
            }
        }
    }
}

/// Filesystems polled together, one cycle at a time.
#[derive(Debug, Clone, Default)]
pub struct MonitorSet {
    monitors: Vec<FilesystemMonitor>,
}

impl MonitorSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_targets(targets: &[FilesystemTarget]) -> Self {
        Self {
            monitors: targets.iter().map(FilesystemMonitor::from_target).collect(),
        }
    }

    pub fn push(&mut self, monitor: FilesystemMonitor) {
        self.monitors.push(monitor);
    }

    #[must_use]
    pub fn monitors(&self) -> &[FilesystemMonitor] {
        &self.monitors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// One polling cycle: check the mount table once, then poll every
    /// filesystem in order. A failure never stops the others.
    pub fn poll_all(&mut self, ctx: &MonitorContext) -> Vec<PollOutcome> {
        ctx.begin_cycle();
        self.monitors
            .iter_mut()
            .map(|monitor| monitor.poll(ctx))
            .collect()
    }

    #[must_use]
    pub fn reports(&self, ctx: &MonitorContext) -> Vec<FilesystemReport> {
        self.monitors
            .iter()
            .map(|monitor| monitor.report(ctx))
            .collect()
    }
}
