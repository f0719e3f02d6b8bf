//! Signal handling for watch mode: SIGTERM/SIGINT stop the loop after the
//! current cycle, SIGHUP forces every filesystem to re-resolve.
//!
//! Uses the `signal-hook` crate for safe signal registration. The watch loop
//! polls `SignalHandler` flags between cycles rather than blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Thread-safe signal state shared between the signal handler and the loop.
#[derive(Clone, Debug)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    rescan_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a handler and register OS signal hooks.
    ///
    /// Registration is best-effort; failures are logged but not fatal.
    pub fn new() -> Self {
        let handler = Self::unregistered();
        handler.register_signals();
        handler
    }

    /// Flags only, no OS hooks. Requests come from `request_*` calls.
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            rescan_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check (and clear) whether a mount-table rescan was requested.
    pub fn should_rescan(&self) -> bool {
        self.rescan_flag.swap(false, Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_rescan(&self) {
        self.rescan_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        for (name, signal) in [("SIGTERM", SIGTERM), ("SIGINT", SIGINT)] {
            if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&self.shutdown_flag)) {
                tracing::warn!("[FSM-SIGNAL] failed to register {name}: {err}");
            }
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::SIGHUP;
            if let Err(err) = signal_hook::flag::register(SIGHUP, Arc::clone(&self.rescan_flag)) {
                tracing::warn!("[FSM-SIGNAL] failed to register SIGHUP: {err}");
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
