//! PAL trait with the host implementation and an in-memory mock.
//!
//! Everything the monitor learns about the operating system passes through
//! [`Platform`]: the mount table, path canonicalization, kernel statistics
//! files, userland statistics tools, and `statvfs`.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{FsmonError, Result};
use crate::platform::mount_table::{
    MountEntry, parse_mnttab, parse_mount_output, parse_proc_mounts,
};
use crate::platform::usage::{BlockUnit, RawUsage};

/// Operating-system family; selects mount-table format and activity sources.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Linux,
    Solaris,
    Darwin,
    FreeBsd,
    NetBsd,
    OpenBsd,
    HpUx,
}

impl Flavor {
    /// Flavor of the running host, if it is one we know how to monitor.
    #[must_use]
    pub const fn current() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(any(target_os = "solaris", target_os = "illumos")) {
            Some(Self::Solaris)
        } else if cfg!(target_os = "macos") {
            Some(Self::Darwin)
        } else if cfg!(target_os = "freebsd") {
            Some(Self::FreeBsd)
        } else if cfg!(target_os = "netbsd") {
            Some(Self::NetBsd)
        } else if cfg!(target_os = "openbsd") {
            Some(Self::OpenBsd)
        } else if cfg!(target_os = "hpux") {
            Some(Self::HpUx)
        } else {
            None
        }
    }

    /// Reporting block size convention for `statvfs` results.
    #[must_use]
    pub const fn block_unit(self) -> BlockUnit {
        match self {
            Self::Solaris => BlockUnit::Block,
            Self::Linux
            | Self::Darwin
            | Self::FreeBsd
            | Self::NetBsd
            | Self::OpenBsd
            | Self::HpUx => BlockUnit::Fragment,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Solaris => "solaris",
            Self::Darwin => "darwin",
            Self::FreeBsd => "freebsd",
            Self::NetBsd => "netbsd",
            Self::OpenBsd => "openbsd",
            Self::HpUx => "hpux",
        }
    }
}

/// How mount-table changes can be detected on a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSource {
    /// Kernel signals a priority event on the file when the table changes.
    Notify(PathBuf),
    /// The table file's modification time moves on every change.
    ModifiedTime(PathBuf),
    /// No signal at all; compare whole table snapshots.
    Snapshot,
}

/// OS abstraction used by resolution, usage and activity probes.
pub trait Platform: Send + Sync {
    fn flavor(&self) -> Flavor;

    /// Current mount table in system order.
    fn mount_table(&self) -> Result<Vec<MountEntry>>;

    fn change_source(&self) -> ChangeSource;

    /// Canonical absolute path with every symlink resolved.
    fn real_path(&self, path: &Path) -> io::Result<PathBuf>;

    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    fn read_text(&self, path: &Path) -> io::Result<String>;

    /// Run a statistics tool and capture stdout; non-zero exit is an error.
    fn command_output(&self, program: &str, args: &[&str]) -> Result<String>;

    fn raw_usage(&self, mountpoint: &Path) -> Result<RawUsage>;
}

/// Live implementation backed by the running kernel.
#[derive(Debug, Clone, Copy)]
pub struct HostPlatform {
    flavor: Flavor,
}

impl HostPlatform {
    #[must_use]
    pub const fn new(flavor: Flavor) -> Self {
        Self { flavor }
    }

    fn table_file(&self) -> Option<&'static str> {
        match self.flavor {
            Flavor::Linux => Some("/proc/self/mounts"),
            Flavor::Solaris | Flavor::HpUx => Some("/etc/mnttab"),
            Flavor::Darwin | Flavor::FreeBsd | Flavor::NetBsd | Flavor::OpenBsd => None,
        }
    }
}

impl Platform for HostPlatform {
    fn flavor(&self) -> Flavor {
        self.flavor
    }

    fn mount_table(&self) -> Result<Vec<MountEntry>> {
        let Some(file) = self.table_file() else {
            let raw = self.command_output("mount", &[]).map_err(|err| {
                FsmonError::MountTableUnavailable {
                    source_name: "mount(8)".to_string(),
                    details: err.to_string(),
                }
            })?;
            return parse_mount_output(&raw);
        };
        let raw = fs::read_to_string(file).map_err(|err| FsmonError::MountTableUnavailable {
            source_name: file.to_string(),
            details: err.to_string(),
        })?;
        // HP-UX keeps mnttab in the whitespace-separated mntent layout.
        Ok(match self.flavor {
            Flavor::Solaris => parse_mnttab(&raw),
            _ => parse_proc_mounts(&raw),
        })
    }

    fn change_source(&self) -> ChangeSource {
        match self.flavor {
            Flavor::Linux => ChangeSource::Notify(PathBuf::from("/proc/self/mounts")),
            Flavor::Solaris | Flavor::HpUx => {
                ChangeSource::ModifiedTime(PathBuf::from("/etc/mnttab"))
            }
            Flavor::Darwin | Flavor::FreeBsd | Flavor::NetBsd | Flavor::OpenBsd => {
                ChangeSource::Snapshot
            }
        }
    }

    fn real_path(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn command_output(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| FsmonError::Command {
                program: program.to_string(),
                details: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(FsmonError::Command {
                program: program.to_string(),
                details: format!(
                    "exit {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    #[cfg(unix)]
    #[allow(clippy::useless_conversion)]
    fn raw_usage(&self, mountpoint: &Path) -> Result<RawUsage> {
        let stat =
            nix::sys::statvfs::statvfs(mountpoint).map_err(|errno| FsmonError::StatUnavailable {
                mountpoint: mountpoint.to_path_buf(),
                details: errno.to_string(),
            })?;
        Ok(RawUsage {
            block_size: u64::from(stat.block_size()),
            fragment_size: u64::from(stat.fragment_size()),
            blocks: u64::from(stat.blocks()),
            blocks_free: u64::from(stat.blocks_free()),
            blocks_available: u64::from(stat.blocks_available()),
            files: u64::from(stat.files()),
            files_free: u64::from(stat.files_free()),
            flags: u64::from(stat.flags().bits()),
        })
    }

    #[cfg(not(unix))]
    fn raw_usage(&self, mountpoint: &Path) -> Result<RawUsage> {
        Err(FsmonError::StatUnavailable {
            mountpoint: mountpoint.to_path_buf(),
            details: "statvfs is not available on this platform".to_string(),
        })
    }
}

/// Detect active platform implementation.
pub fn detect_platform() -> Result<Arc<dyn Platform>> {
    Flavor::current()
        .map(|flavor| Arc::new(HostPlatform::new(flavor)) as Arc<dyn Platform>)
        .ok_or_else(|| FsmonError::UnsupportedPlatform {
            details: format!(
                "{} has no supported mount table or statistics source",
                std::env::consts::OS
            ),
        })
}

/// In-memory mock implementation for deterministic tests.
///
/// Every lookup that has not been seeded fails the way the real call would
/// for a missing object.
#[derive(Debug)]
pub struct MockPlatform {
    flavor: Flavor,
    change_source: Mutex<ChangeSource>,
    mounts: Mutex<Option<Vec<MountEntry>>>,
    real_paths: Mutex<HashMap<PathBuf, std::result::Result<PathBuf, io::ErrorKind>>>,
    mtimes: Mutex<HashMap<PathBuf, SystemTime>>,
    files: Mutex<HashMap<PathBuf, String>>,
    commands: Mutex<HashMap<String, std::result::Result<String, String>>>,
    usage: Mutex<HashMap<PathBuf, RawUsage>>,
    mount_table_calls: AtomicUsize,
    command_calls: AtomicUsize,
}

impl MockPlatform {
    #[must_use]
    pub fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            change_source: Mutex::new(ChangeSource::Snapshot),
            mounts: Mutex::new(Some(Vec::new())),
            real_paths: Mutex::new(HashMap::new()),
            mtimes: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            commands: Mutex::new(HashMap::new()),
            usage: Mutex::new(HashMap::new()),
            mount_table_calls: AtomicUsize::new(0),
            command_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_change_source(&self, source: ChangeSource) {
        *self.change_source.lock() = source;
    }

    pub fn set_mounts(&self, mounts: Vec<MountEntry>) {
        *self.mounts.lock() = Some(mounts);
    }

    /// Make the mount table unreadable until the next `set_mounts`.
    pub fn fail_mounts(&self) {
        *self.mounts.lock() = None;
    }

    pub fn set_real_path(&self, path: impl Into<PathBuf>, target: impl Into<PathBuf>) {
        self.real_paths.lock().insert(path.into(), Ok(target.into()));
    }

    pub fn fail_real_path(&self, path: impl Into<PathBuf>, kind: io::ErrorKind) {
        self.real_paths.lock().insert(path.into(), Err(kind));
    }

    pub fn set_modified(&self, path: impl Into<PathBuf>, at: SystemTime) {
        self.mtimes.lock().insert(path.into(), at);
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.lock().insert(path.into(), contents.into());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.files.lock().remove(path.as_ref());
    }

    /// Seed the stdout of `program args...`.
    pub fn set_command(&self, program: &str, args: &[&str], stdout: impl Into<String>) {
        self.commands
            .lock()
            .insert(command_key(program, args), Ok(stdout.into()));
    }

    pub fn fail_command(&self, program: &str, args: &[&str], details: impl Into<String>) {
        self.commands
            .lock()
            .insert(command_key(program, args), Err(details.into()));
    }

    pub fn set_usage(&self, mountpoint: impl Into<PathBuf>, usage: RawUsage) {
        self.usage.lock().insert(mountpoint.into(), usage);
    }

    pub fn remove_usage(&self, mountpoint: impl AsRef<Path>) {
        self.usage.lock().remove(mountpoint.as_ref());
    }

    #[must_use]
    pub fn mount_table_calls(&self) -> usize {
        self.mount_table_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn command_calls(&self) -> usize {
        self.command_calls.load(Ordering::SeqCst)
    }
}

fn command_key(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Platform for MockPlatform {
    fn flavor(&self) -> Flavor {
        self.flavor
    }

    fn mount_table(&self) -> Result<Vec<MountEntry>> {
        self.mount_table_calls.fetch_add(1, Ordering::SeqCst);
        self.mounts
            .lock()
            .clone()
            .ok_or_else(|| FsmonError::MountTableUnavailable {
                source_name: "mock".to_string(),
                details: "mount table made unavailable".to_string(),
            })
    }

    fn change_source(&self) -> ChangeSource {
        self.change_source.lock().clone()
    }

    fn real_path(&self, path: &Path) -> io::Result<PathBuf> {
        match self.real_paths.lock().get(path) {
            Some(Ok(target)) => Ok(target.clone()),
            Some(Err(kind)) => Err(io::Error::from(*kind)),
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.mtimes
            .lock()
            .get(path)
            .copied()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn command_output(&self, program: &str, args: &[&str]) -> Result<String> {
        self.command_calls.fetch_add(1, Ordering::SeqCst);
        let key = command_key(program, args);
        match self.commands.lock().get(&key) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(details)) => Err(FsmonError::Command {
                program: program.to_string(),
                details: details.clone(),
            }),
            None => Err(FsmonError::Command {
                program: program.to_string(),
                details: format!("no mock output for `{key}`"),
            }),
        }
    }

    fn raw_usage(&self, mountpoint: &Path) -> Result<RawUsage> {
        self.usage
            .lock()
            .get(mountpoint)
            .copied()
            .ok_or_else(|| FsmonError::StatUnavailable {
                mountpoint: mountpoint.to_path_buf(),
                details: "mock usage not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solaris_reports_in_block_units() {
        assert_eq!(Flavor::Solaris.block_unit(), BlockUnit::Block);
        assert_eq!(Flavor::Linux.block_unit(), BlockUnit::Fragment);
        assert_eq!(Flavor::FreeBsd.as_str(), "freebsd");
        for flavor in [Flavor::NetBsd, Flavor::OpenBsd, Flavor::HpUx] {
            assert_eq!(flavor.block_unit(), BlockUnit::Fragment);
        }
        assert_eq!(Flavor::OpenBsd.as_str(), "openbsd");
        assert_eq!(Flavor::HpUx.as_str(), "hpux");
    }

    #[test]
    fn host_change_sources_follow_flavor() {
        assert_eq!(
            HostPlatform::new(Flavor::Linux).change_source(),
            ChangeSource::Notify(PathBuf::from("/proc/self/mounts"))
        );
        assert_eq!(
            HostPlatform::new(Flavor::Solaris).change_source(),
            ChangeSource::ModifiedTime(PathBuf::from("/etc/mnttab"))
        );
        assert_eq!(
            HostPlatform::new(Flavor::Darwin).change_source(),
            ChangeSource::Snapshot
        );
        assert_eq!(
            HostPlatform::new(Flavor::OpenBsd).change_source(),
            ChangeSource::Snapshot
        );
        assert_eq!(
            HostPlatform::new(Flavor::HpUx).change_source(),
            ChangeSource::ModifiedTime(PathBuf::from("/etc/mnttab"))
        );
    }

    #[test]
    fn bsd_tables_come_from_mount_command_and_hpux_from_mnttab() {
        assert_eq!(HostPlatform::new(Flavor::NetBsd).table_file(), None);
        assert_eq!(HostPlatform::new(Flavor::OpenBsd).table_file(), None);
        assert_eq!(
            HostPlatform::new(Flavor::HpUx).table_file(),
            Some("/etc/mnttab")
        );
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn host_platform_reads_live_mount_table_and_usage() {
        let platform = detect_platform().expect("linux is supported");
        let mounts = platform.mount_table().expect("mount table");
        assert!(mounts.iter().any(|entry| entry.mountpoint == Path::new("/")));
        let usage = platform.raw_usage(Path::new("/")).expect("statvfs /");
        assert!(usage.fragment_size > 0);
    }

    #[test]
    fn host_command_failure_is_reported() {
        let err = HostPlatform::new(Flavor::Linux)
            .command_output("fsmon-definitely-not-a-real-tool", &[])
            .expect_err("missing program");
        assert_eq!(err.code(), "FSM-3004");
    }

    #[test]
    fn mock_unseeded_lookups_fail_like_missing_objects() {
        let mock = MockPlatform::new(Flavor::Linux);
        assert_eq!(
            mock.real_path(Path::new("/dev/nope"))
                .expect_err("unseeded")
                .kind(),
            io::ErrorKind::NotFound
        );
        assert!(mock.read_text(Path::new("/proc/x")).is_err());
        assert_eq!(
            mock.raw_usage(Path::new("/")).expect_err("no usage").code(),
            "FSM-2004"
        );
        assert_eq!(
            mock.command_output("kstat", &["-p"]).expect_err("no cmd").code(),
            "FSM-3004"
        );
    }

    #[test]
    fn mock_counts_calls_and_serves_seeded_data() {
        let mock = MockPlatform::new(Flavor::Solaris);
        mock.set_mounts(vec![MountEntry::new("/", "/dev/dsk/c0t0d0s0", "ufs")]);
        mock.set_command("kstat", &["-p", "-m", "cmdk"], "cmdk:0:cmdk0:nread\t10\n");
        assert_eq!(mock.mount_table().expect("mounts").len(), 1);
        assert_eq!(mock.mount_table_calls(), 1);
        assert!(
            mock.command_output("kstat", &["-p", "-m", "cmdk"])
                .expect("seeded")
                .contains("nread")
        );
        assert_eq!(mock.command_calls(), 1);
        mock.fail_mounts();
        assert_eq!(mock.mount_table().expect_err("failed").code(), "FSM-2001");
    }
}
