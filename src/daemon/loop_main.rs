//! Persistent watch loop: poll every configured filesystem each interval
//! until a shutdown signal arrives or the cycle budget runs out.

#![allow(missing_docs)]

use std::thread;
use std::time::{Duration, Instant};

use crate::daemon::signals::SignalHandler;
use crate::monitor::context::MonitorContext;
use crate::monitor::filesystem::{MonitorSet, PollOutcome};

/// Upper bound on a single sleep so shutdown stays responsive.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchArgs {
    pub interval: Duration,
    /// Stop after this many cycles; `None` runs until signalled.
    pub max_cycles: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub cycles: u64,
    pub failed_polls: u64,
}

pub struct WatchLoop {
    ctx: MonitorContext,
    monitors: MonitorSet,
    signals: SignalHandler,
    args: WatchArgs,
}

impl WatchLoop {
    #[must_use]
    pub fn new(
        ctx: MonitorContext,
        monitors: MonitorSet,
        signals: SignalHandler,
        args: WatchArgs,
    ) -> Self {
        Self {
            ctx,
            monitors,
            signals,
            args,
        }
    }

    #[must_use]
    pub const fn context(&self) -> &MonitorContext {
        &self.ctx
    }

    #[must_use]
    pub const fn monitors(&self) -> &MonitorSet {
        &self.monitors
    }

    /// Run until shutdown. `on_cycle` sees every cycle's outcomes in order.
    pub fn run<F>(&mut self, mut on_cycle: F) -> WatchSummary
    where
        F: FnMut(u64, &MonitorContext, &MonitorSet, &[PollOutcome]),
    {
        let mut summary = WatchSummary::default();
        tracing::info!(
            "[FSM-WATCH] watching {} filesystem(s) every {:?}",
            self.monitors.len(),
            self.args.interval
        );

        loop {
            if self.signals.should_shutdown() {
                tracing::info!("[FSM-WATCH] shutdown requested");
                break;
            }
            if self.signals.should_rescan() {
                self.ctx.io_tables().clear();
                let generation = self.ctx.mount_cache().bump();
                tracing::info!("[FSM-WATCH] rescan requested, generation now {generation}");
            }

            let outcomes = self.monitors.poll_all(&self.ctx);
            summary.cycles += 1;
            summary.failed_polls += outcomes.iter().filter(|outcome| !outcome.success).count() as u64;
            on_cycle(summary.cycles, &self.ctx, &self.monitors, &outcomes);

            if self
                .args
                .max_cycles
                .is_some_and(|max| summary.cycles >= max)
            {
                break;
            }
            self.sleep_interruptible();
        }
        summary
    }

    fn sleep_interruptible(&self) {
        let deadline = Instant::now() + self.args.interval;
        loop {
            if self.signals.should_shutdown() {
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}
