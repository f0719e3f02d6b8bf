//! Mount-table change detection and the global resolution generation.
//!
//! Records remember the generation they were resolved under. Whenever a
//! change in the mount table is observed the generation moves forward and
//! every record re-resolves on its next poll.

#![allow(missing_docs)]

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::platform::mount_table::MountEntry;
use crate::platform::pal::{ChangeSource, Platform};

/// Whether the caller polls once and exits or keeps running.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Oneshot,
    Persistent,
}

#[derive(Debug, Default)]
enum Watch {
    #[default]
    Idle,
    Notify(File),
    ModifiedTime(SystemTime),
    Snapshot(Vec<MountEntry>),
}

#[derive(Debug, Default)]
struct WatchState {
    watch: Watch,
    notify_unavailable: bool,
}

/// Process-wide mount table generation counter plus its change watch.
#[derive(Debug)]
pub struct MountTableCache {
    generation: AtomicU64,
    state: Mutex<WatchState>,
}

impl Default for MountTableCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MountTableCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(1),
            state: Mutex::new(WatchState::default()),
        }
    }

    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Force every record to re-resolve on its next poll.
    pub fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Check the platform's change source once; returns true if the mount
    /// table changed since the previous check.
    ///
    /// The first observation of any source only records a baseline.
    pub fn invalidate_if_changed(&self, platform: &dyn Platform, mode: RunMode) -> bool {
        let mut state = self.state.lock();
        let changed = match platform.change_source() {
            ChangeSource::Notify(_) if mode == RunMode::Oneshot => false,
            ChangeSource::Notify(path) if !state.notify_unavailable => {
                match state.poll_notify(&path) {
                    Ok(changed) => changed,
                    Err(err) => {
                        tracing::warn!(
                            "[FSM-MOUNTCACHE] cannot watch {} -- {err}; comparing snapshots instead",
                            path.display()
                        );
                        state.notify_unavailable = true;
                        state.watch = Watch::Idle;
                        state.observe_snapshot(platform)
                    }
                }
            }
            ChangeSource::Notify(_) | ChangeSource::Snapshot => state.observe_snapshot(platform),
            ChangeSource::ModifiedTime(path) => state.observe_mtime(platform, &path),
        };
        drop(state);

        if changed {
            let generation = self.bump();
            tracing::debug!("[FSM-MOUNTCACHE] mount table changed, generation now {generation}");
        }
        changed
    }
}

impl WatchState {
    #[cfg(unix)]
    fn poll_notify(&mut self, path: &Path) -> io::Result<bool> {
        use std::io::{Read, Seek, SeekFrom};
        use std::os::fd::AsFd;

        use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

        let Watch::Notify(file) = &mut self.watch else {
            // Opened lazily; the kernel reports changes made after this point.
            self.watch = Watch::Notify(File::open(path)?);
            return Ok(false);
        };

        let changed = {
            let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLPRI)];
            let ready = poll(&mut fds, PollTimeout::ZERO).map_err(io::Error::from)?;
            ready > 0
                && fds[0]
                    .revents()
                    .is_some_and(|events| events.intersects(PollFlags::POLLPRI | PollFlags::POLLERR))
        };
        if changed {
            // Reading the table to the end acknowledges the event.
            file.seek(SeekFrom::Start(0))?;
            let mut sink = Vec::new();
            file.read_to_end(&mut sink)?;
        }
        Ok(changed)
    }

    #[cfg(not(unix))]
    fn poll_notify(&mut self, _path: &Path) -> io::Result<bool> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    fn observe_snapshot(&mut self, platform: &dyn Platform) -> bool {
        let table = match platform.mount_table() {
            Ok(table) => table,
            Err(err) => {
                tracing::debug!("[FSM-MOUNTCACHE] snapshot skipped: {err}");
                return false;
            }
        };
        let changed = matches!(&self.watch, Watch::Snapshot(previous) if *previous != table);
        self.watch = Watch::Snapshot(table);
        changed
    }

    fn observe_mtime(&mut self, platform: &dyn Platform, path: &Path) -> bool {
        let modified = match platform.modified(path) {
            Ok(modified) => modified,
            Err(err) => {
                tracing::debug!("[FSM-MOUNTCACHE] cannot stat {}: {err}", path.display());
                return false;
            }
        };
        let changed = matches!(self.watch, Watch::ModifiedTime(previous) if previous != modified);
        self.watch = Watch::ModifiedTime(modified);
        changed
    }
}
