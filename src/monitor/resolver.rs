//! Device resolution: map a mountpoint or device path to the statistics
//! source that carries its I/O counters.

#![allow(missing_docs)]

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{FsmonError, Result};
use crate::platform::mount_table::MountEntry;
use crate::platform::pal::{Flavor, Platform};

/// How a configured filesystem path is matched against the mount table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatchBy {
    #[default]
    Mountpoint,
    Device,
}

/// Which statistics source feeds a filesystem's activity counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityProbeKind {
    Block,
    Nfs,
    Cifs,
    Zfs,
    Registry,
    Unsupported,
}

/// Why a mounted filesystem has no activity data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedReason {
    /// Source is not a real device node (tmpfs, proc, FUSE, overlay ...).
    Virtual,
    /// Real filesystem whose statistics this platform does not expose.
    NoActivitySource,
}

/// Kernel statistics address: `module:instance:name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct KstatName {
    pub module: String,
    pub instance: u32,
    pub name: String,
}

/// Outcome of resolving one mount-table entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub mountpoint: PathBuf,
    /// Mount source exactly as the mount table lists it.
    pub device: String,
    /// Identifier the activity source is indexed by.
    pub canonical_key: String,
    pub fs_type: String,
    pub kind: ActivityProbeKind,
    pub kstat: Option<KstatName>,
    pub unsupported: Option<UnsupportedReason>,
}

impl ResolvedDevice {
    fn new(entry: &MountEntry, kind: ActivityProbeKind, canonical_key: impl Into<String>) -> Self {
        Self {
            mountpoint: entry.mountpoint.clone(),
            device: entry.source.clone(),
            canonical_key: canonical_key.into(),
            fs_type: entry.fs_type.clone(),
            kind,
            kstat: None,
            unsupported: None,
        }
    }

    fn unsupported(entry: &MountEntry, reason: UnsupportedReason) -> Self {
        let mut resolved = Self::new(entry, ActivityProbeKind::Unsupported, entry.source.clone());
        resolved.unsupported = Some(reason);
        resolved
    }

    fn with_kstat(mut self, module: &str, instance: u32, name: &str) -> Self {
        self.kstat = Some(KstatName {
            module: module.to_string(),
            instance,
            name: name.to_string(),
        });
        self
    }
}

/// Stateless resolver over a platform's mount table.
pub struct DeviceResolver<'a> {
    platform: &'a dyn Platform,
}

impl<'a> DeviceResolver<'a> {
    #[must_use]
    pub fn new(platform: &'a dyn Platform) -> Self {
        Self { platform }
    }

    /// Read the mount table and resolve the first entry matching `query`.
    pub fn resolve(&self, query: &str, match_by: MatchBy) -> Result<ResolvedDevice> {
        let mounts = self.platform.mount_table()?;
        self.resolve_in(&mounts, query, match_by)
    }

    /// Resolve against an already listed table.
    pub fn resolve_in(
        &self,
        mounts: &[MountEntry],
        query: &str,
        match_by: MatchBy,
    ) -> Result<ResolvedDevice> {
        let entry = match match_by {
            MatchBy::Mountpoint => mounts
                .iter()
                .filter(|entry| entry.source != "rootfs")
                .find(|entry| entry.mountpoint == Path::new(query)),
            MatchBy::Device => self.find_by_device(mounts, query),
        }
        .ok_or_else(|| FsmonError::NotFound {
            query: query.to_string(),
        })?;

        let resolved = self.classify(entry)?;
        tracing::debug!(
            mountpoint = %resolved.mountpoint.display(),
            key = %resolved.canonical_key,
            kind = ?resolved.kind,
            "[FSM-RESOLVE] resolved {query}"
        );
        Ok(resolved)
    }

    /// Reverse lookup: mountpoint of the filesystem mounted from `device`.
    pub fn mountpoint_for_device(&self, device: &str) -> Result<PathBuf> {
        let mounts = self.platform.mount_table()?;
        self.find_by_device(&mounts, device)
            .map(|entry| entry.mountpoint.clone())
            .ok_or_else(|| FsmonError::NotFound {
                query: device.to_string(),
            })
    }

    fn find_by_device<'m>(&self, mounts: &'m [MountEntry], device: &str) -> Option<&'m MountEntry> {
        let query_real = self.platform.real_path(Path::new(device)).ok();
        mounts
            .iter()
            .filter(|entry| entry.source != "rootfs")
            .find(|entry| {
                if entry.source == device {
                    return true;
                }
                if !entry.source.starts_with('/') {
                    return false;
                }
                self.platform
                    .real_path(Path::new(&entry.source))
                    .is_ok_and(|real| {
                        real == Path::new(device) || query_real.as_deref() == Some(real.as_path())
                    })
            })
    }

    /// Classify a mount entry into an activity source.
    pub fn classify(&self, entry: &MountEntry) -> Result<ResolvedDevice> {
        let fs_type = entry.fs_type.as_str();
        let flavor = self.platform.flavor();

        if fs_type.starts_with("nfs") {
            return Ok(self.classify_nfs(entry));
        }
        if fs_type == "cifs" || fs_type.starts_with("smb") {
            return Ok(match flavor {
                Flavor::Linux => {
                    ResolvedDevice::new(entry, ActivityProbeKind::Cifs, entry.source.replace('/', "\\"))
                }
                _ => ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource),
            });
        }
        if fs_type == "zfs" {
            let pool = entry.source.split('/').next().unwrap_or_default();
            return Ok(match flavor {
                Flavor::Linux => ResolvedDevice::new(entry, ActivityProbeKind::Zfs, pool),
                Flavor::Solaris => {
                    ResolvedDevice::new(entry, ActivityProbeKind::Zfs, pool).with_kstat("zfs", 0, pool)
                }
                _ => ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource),
            });
        }

        if !entry.source.starts_with('/') {
            return Ok(ResolvedDevice::unsupported(entry, UnsupportedReason::Virtual));
        }
        let real = match self.platform.real_path(Path::new(&entry.source)) {
            Ok(real) => real,
            Err(err) if is_virtual_source(&err) => {
                return Ok(ResolvedDevice::unsupported(entry, UnsupportedReason::Virtual));
            }
            Err(err) => {
                return Err(FsmonError::DeviceResolution {
                    path: entry.source.clone(),
                    details: err.to_string(),
                });
            }
        };

        Ok(match flavor {
            Flavor::Linux => {
                let name = basename(&real);
                ResolvedDevice::new(entry, ActivityProbeKind::Block, name)
            }
            Flavor::Solaris => self.classify_solaris_block(entry, &real),
            Flavor::Darwin => classify_darwin(entry, &real),
            Flavor::FreeBsd => classify_freebsd(entry, &real),
            // No per-disk counter source is read on these platforms.
            Flavor::NetBsd | Flavor::OpenBsd | Flavor::HpUx => {
                ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource)
            }
        })
    }

    fn classify_nfs(&self, entry: &MountEntry) -> ResolvedDevice {
        match self.platform.flavor() {
            Flavor::Linux => ResolvedDevice::new(entry, ActivityProbeKind::Nfs, entry.source.clone()),
            Flavor::Solaris => match entry.option("dev").and_then(solaris_minor) {
                Some(minor) => {
                    let name = format!("nfs{minor}");
                    ResolvedDevice::new(entry, ActivityProbeKind::Nfs, name.clone())
                        .with_kstat("nfs", minor, &name)
                }
                None => {
                    tracing::warn!(
                        "[FSM-RESOLVE] mount point {} -- no usable dev= option for nfs mount",
                        entry.mountpoint.display()
                    );
                    ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource)
                }
            },
            _ => ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource),
        }
    }

    fn classify_solaris_block(&self, entry: &MountEntry, real: &Path) -> ResolvedDevice {
        let real_str = real.to_string_lossy();
        let Some((physical, partition)) = real_str
            .strip_prefix("/devices")
            .filter(|rest| rest.starts_with('/'))
            .and_then(|rest| rest.rsplit_once(':'))
        else {
            tracing::warn!(
                "[FSM-RESOLVE] mount point {} -- invalid device {real_str}",
                entry.mountpoint.display()
            );
            return ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource);
        };

        let table = match self.platform.read_text(Path::new("/etc/path_to_inst")) {
            Ok(table) => table,
            Err(err) => {
                tracing::warn!("[FSM-RESOLVE] cannot read /etc/path_to_inst -- {err}");
                return ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource);
            }
        };
        let Some((instance, driver)) = lookup_path_to_inst(&table, physical) else {
            tracing::warn!(
                "[FSM-RESOLVE] mount point {} -- {physical} not listed in /etc/path_to_inst",
                entry.mountpoint.display()
            );
            return ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource);
        };

        // cmdk only publishes whole-disk statistics.
        let name = if driver == "cmdk" {
            format!("{driver}{instance}")
        } else {
            format!("{driver}{instance},{partition}")
        };
        ResolvedDevice::new(entry, ActivityProbeKind::Block, name.clone())
            .with_kstat(&driver, instance, &name)
    }
}

fn is_virtual_source(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .into_owned()
}

/// Minor device number from a Solaris mnttab `dev=` option (hex).
///
/// Values wider than 32 bits are 64-bit expanded device numbers with a 32-bit
/// minor; anything else is the compressed form with an 18-bit minor.
fn solaris_minor(raw: &str) -> Option<u32> {
    let dev = u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()?;
    let minor = if dev > u64::from(u32::MAX) {
        dev & 0xffff_ffff
    } else {
        dev & 0x3_ffff
    };
    u32::try_from(minor).ok()
}

/// Find `"<physical>" <instance> "<driver>"` in `/etc/path_to_inst`.
fn lookup_path_to_inst(table: &str, physical: &str) -> Option<(u32, String)> {
    table
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let rest = line.strip_prefix('"')?;
            let (path, rest) = rest.split_once('"')?;
            if path != physical {
                return None;
            }
            let mut fields = rest.split_whitespace();
            let instance = fields.next()?.parse::<u32>().ok()?;
            let driver = fields.next()?.trim_matches('"');
            (!driver.is_empty()).then(|| (instance, driver.to_string()))
        })
}

fn classify_darwin(entry: &MountEntry, real: &Path) -> ResolvedDevice {
    if !matches!(entry.fs_type.as_str(), "hfs" | "apfs") {
        return ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource);
    }
    let name = basename(real);
    match whole_disk(&name, "disk") {
        Some(disk) => ResolvedDevice::new(entry, ActivityProbeKind::Registry, disk),
        None => {
            tracing::warn!(
                "[FSM-RESOLVE] mount point {} -- {name} is not a disk slice",
                entry.mountpoint.display()
            );
            ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource)
        }
    }
}

fn classify_freebsd(entry: &MountEntry, real: &Path) -> ResolvedDevice {
    let name = basename(real);
    let Some(driver_end) = name.find(|c: char| c.is_ascii_digit()) else {
        tracing::warn!(
            "[FSM-RESOLVE] mount point {} -- cannot derive driver unit from {name}",
            entry.mountpoint.display()
        );
        return ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource);
    };
    match whole_disk(&name, &name[..driver_end]) {
        Some(unit) => ResolvedDevice::new(entry, ActivityProbeKind::Block, unit),
        None => ResolvedDevice::unsupported(entry, UnsupportedReason::NoActivitySource),
    }
}

/// `prefix` followed by its first run of digits: `disk3s1s1` -> `disk3`,
/// `ada0p2` -> `ada0`.
fn whole_disk(name: &str, prefix: &str) -> Option<String> {
    let rest = name.strip_prefix(prefix)?;
    if prefix.is_empty() {
        return None;
    }
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    (digits > 0).then(|| format!("{prefix}{}", &rest[..digits]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::pal::MockPlatform;

    fn linux() -> MockPlatform {
        let mock = MockPlatform::new(Flavor::Linux);
        mock.set_mounts(vec![
            MountEntry::new("/", "rootfs", "rootfs"),
            MountEntry::new("/", "/dev/mapper/root", "ext4"),
            MountEntry::new("/tmp", "tmpfs", "tmpfs"),
            MountEntry::new("/mnt/fuse", "/dev/fuse", "fuse.sshfs"),
            MountEntry::new("/mnt/nfs", "server:/export", "nfs4"),
            MountEntry::new("/mnt/share", "//server/share", "cifs"),
            MountEntry::new("/tank/home", "tank/home", "zfs"),
        ]);
        mock.set_real_path("/dev/mapper/root", "/dev/dm-0");
        mock
    }

    #[test]
    fn linux_block_device_uses_real_path_basename() {
        let mock = linux();
        let resolved = DeviceResolver::new(&mock)
            .resolve("/", MatchBy::Mountpoint)
            .expect("resolve /");
        assert_eq!(resolved.kind, ActivityProbeKind::Block);
        assert_eq!(resolved.canonical_key, "dm-0");
        assert_eq!(resolved.device, "/dev/mapper/root");
    }

    #[test]
    fn linux_network_and_pool_keys() {
        let mock = linux();
        let resolver = DeviceResolver::new(&mock);
        let nfs = resolver.resolve("/mnt/nfs", MatchBy::Mountpoint).expect("nfs");
        assert_eq!(nfs.kind, ActivityProbeKind::Nfs);
        assert_eq!(nfs.canonical_key, "server:/export");

        let cifs = resolver.resolve("/mnt/share", MatchBy::Mountpoint).expect("cifs");
        assert_eq!(cifs.kind, ActivityProbeKind::Cifs);
        assert_eq!(cifs.canonical_key, "\\\\server\\share");

        let zfs = resolver.resolve("/tank/home", MatchBy::Mountpoint).expect("zfs");
        assert_eq!(zfs.kind, ActivityProbeKind::Zfs);
        assert_eq!(zfs.canonical_key, "tank");
    }

    #[test]
    fn virtual_sources_are_unsupported_not_errors() {
        let mock = linux();
        let resolver = DeviceResolver::new(&mock);
        let tmp = resolver.resolve("/tmp", MatchBy::Mountpoint).expect("tmpfs");
        assert_eq!(tmp.kind, ActivityProbeKind::Unsupported);
        assert_eq!(tmp.unsupported, Some(UnsupportedReason::Virtual));

        // /dev/fuse is not seeded, so its real path does not exist.
        let fuse = resolver.resolve("/mnt/fuse", MatchBy::Mountpoint).expect("fuse");
        assert_eq!(fuse.unsupported, Some(UnsupportedReason::Virtual));

        mock.fail_real_path("/dev/fuse", io::ErrorKind::NotADirectory);
        let fuse = resolver.resolve("/mnt/fuse", MatchBy::Mountpoint).expect("fuse");
        assert_eq!(fuse.unsupported, Some(UnsupportedReason::Virtual));
    }

    #[test]
    fn other_real_path_failures_are_resolution_errors() {
        let mock = linux();
        mock.fail_real_path("/dev/mapper/root", io::ErrorKind::PermissionDenied);
        let err = DeviceResolver::new(&mock)
            .resolve("/", MatchBy::Mountpoint)
            .expect_err("EACCES");
        assert_eq!(err.code(), "FSM-2003");
    }

    #[test]
    fn missing_mountpoint_is_not_found() {
        let mock = linux();
        let err = DeviceResolver::new(&mock)
            .resolve("/data", MatchBy::Mountpoint)
            .expect_err("absent");
        assert_eq!(err.code(), "FSM-2002");
    }

    #[test]
    fn rootfs_is_skipped_even_when_first() {
        let mock = linux();
        let resolved = DeviceResolver::new(&mock)
            .resolve("/", MatchBy::Mountpoint)
            .expect("resolve /");
        assert_ne!(resolved.fs_type, "rootfs");
    }

    #[test]
    fn device_matching_follows_symlinks() {
        let mock = linux();
        let resolver = DeviceResolver::new(&mock);
        let by_source = resolver
            .resolve("/dev/mapper/root", MatchBy::Device)
            .expect("source match");
        assert_eq!(by_source.mountpoint, Path::new("/"));
        let by_real = resolver.resolve("/dev/dm-0", MatchBy::Device).expect("real match");
        assert_eq!(by_real.mountpoint, Path::new("/"));

        mock.set_real_path("/dev/disk/by-label/root", "/dev/dm-0");
        assert_eq!(
            resolver
                .mountpoint_for_device("/dev/disk/by-label/root")
                .expect("alias"),
            PathBuf::from("/")
        );
        assert!(resolver.mountpoint_for_device("/dev/sdz").is_err());
    }

    #[test]
    fn resolution_is_idempotent_for_unchanged_table() {
        let mock = linux();
        let resolver = DeviceResolver::new(&mock);
        let first = resolver.resolve("/", MatchBy::Mountpoint).expect("first");
        let second = resolver.resolve("/", MatchBy::Mountpoint).expect("second");
        assert_eq!(first, second);
    }

    const PATH_TO_INST: &str = "#\tCaution! This file contains critical kernel state\n\
        \"/pci@0,0/pci15ad,1976@10/sd@0,0\" 0 \"sd\"\n\
        \"/pci@0,0/pci-ide@7,1/ide@0/cmdk@0,0\" 1 \"cmdk\"\n";

    fn solaris() -> MockPlatform {
        let mock = MockPlatform::new(Flavor::Solaris);
        mock.set_mounts(vec![
            MountEntry::new("/", "/dev/dsk/c0t0d0s0", "ufs"),
            MountEntry::new("/export", "/dev/dsk/c1d0s7", "ufs"),
            MountEntry::new("/net/a", "fileserver:/vol/a", "nfs").with_options(&["vers=3", "dev=5200001"]),
            MountEntry::new("/net/b", "fileserver:/vol/b", "nfs")
                .with_options(&["dev=12300000004"]),
            MountEntry::new("/rpool", "rpool", "zfs"),
            MountEntry::new("/odd", "/dev/dsk/c9t9d9s9", "ufs"),
        ]);
        mock.set_real_path("/dev/dsk/c0t0d0s0", "/devices/pci@0,0/pci15ad,1976@10/sd@0,0:a");
        mock.set_real_path("/dev/dsk/c1d0s7", "/devices/pci@0,0/pci-ide@7,1/ide@0/cmdk@0,0:h");
        mock.set_real_path("/dev/dsk/c9t9d9s9", "/dev/odd/thing");
        mock.set_file("/etc/path_to_inst", PATH_TO_INST);
        mock
    }

    #[test]
    fn solaris_block_devices_use_path_to_inst() {
        let mock = solaris();
        let resolver = DeviceResolver::new(&mock);
        let sd = resolver.resolve("/", MatchBy::Mountpoint).expect("sd");
        assert_eq!(sd.kind, ActivityProbeKind::Block);
        assert_eq!(sd.canonical_key, "sd0,a");
        assert_eq!(
            sd.kstat,
            Some(KstatName {
                module: "sd".to_string(),
                instance: 0,
                name: "sd0,a".to_string(),
            })
        );

        let cmdk = resolver.resolve("/export", MatchBy::Mountpoint).expect("cmdk");
        assert_eq!(cmdk.canonical_key, "cmdk1");
    }

    #[test]
    fn solaris_nfs_minor_from_dev_option() {
        let mock = solaris();
        let resolver = DeviceResolver::new(&mock);
        let nfs = resolver.resolve("/net/a", MatchBy::Mountpoint).expect("nfs");
        assert_eq!(nfs.canonical_key, "nfs1");
        assert_eq!(nfs.kstat.as_ref().map(|k| k.instance), Some(1));

        let wide = resolver.resolve("/net/b", MatchBy::Mountpoint).expect("nfs64");
        assert_eq!(wide.canonical_key, "nfs4");
    }

    #[test]
    fn solaris_zfs_and_invalid_devices() {
        let mock = solaris();
        let resolver = DeviceResolver::new(&mock);
        let zfs = resolver.resolve("/rpool", MatchBy::Mountpoint).expect("zfs");
        assert_eq!(zfs.kstat.as_ref().map(|k| k.module.as_str()), Some("zfs"));

        let odd = resolver.resolve("/odd", MatchBy::Mountpoint).expect("odd");
        assert_eq!(odd.kind, ActivityProbeKind::Unsupported);
        assert_eq!(odd.unsupported, Some(UnsupportedReason::NoActivitySource));
    }

    #[test]
    fn darwin_and_freebsd_block_keys() {
        let mac = MockPlatform::new(Flavor::Darwin);
        mac.set_mounts(vec![
            MountEntry::new("/", "/dev/disk3s1s1", "apfs"),
            MountEntry::new("/Volumes/USB", "/dev/disk4s1", "msdos"),
            MountEntry::new("/Volumes/nas", "nas:/share", "nfs"),
        ]);
        mac.set_real_path("/dev/disk3s1s1", "/dev/disk3s1s1");
        mac.set_real_path("/dev/disk4s1", "/dev/disk4s1");
        let resolver = DeviceResolver::new(&mac);
        let root = resolver.resolve("/", MatchBy::Mountpoint).expect("apfs");
        assert_eq!(root.kind, ActivityProbeKind::Registry);
        assert_eq!(root.canonical_key, "disk3");
        for unsupported in ["/Volumes/USB", "/Volumes/nas"] {
            let resolved = resolver.resolve(unsupported, MatchBy::Mountpoint).expect("resolves");
            assert_eq!(resolved.kind, ActivityProbeKind::Unsupported);
        }

        let bsd = MockPlatform::new(Flavor::FreeBsd);
        bsd.set_mounts(vec![
            MountEntry::new("/", "/dev/ada0p2", "ufs"),
            MountEntry::new("/zroot", "zroot", "zfs"),
        ]);
        bsd.set_real_path("/dev/ada0p2", "/dev/ada0p2");
        let resolver = DeviceResolver::new(&bsd);
        assert_eq!(
            resolver.resolve("/", MatchBy::Mountpoint).expect("ufs").canonical_key,
            "ada0"
        );
        assert_eq!(
            resolver.resolve("/zroot", MatchBy::Mountpoint).expect("zfs").kind,
            ActivityProbeKind::Unsupported
        );
    }

    #[test]
    fn netbsd_and_openbsd_resolve_without_activity_source() {
        for flavor in [Flavor::NetBsd, Flavor::OpenBsd] {
            let bsd = MockPlatform::new(flavor);
            bsd.set_mounts(vec![
                MountEntry::new("/", "/dev/wd0a", "ffs"),
                MountEntry::new("/tmp", "mfs:123", "mfs"),
                MountEntry::new("/home", "nas:/home", "nfs"),
            ]);
            bsd.set_real_path("/dev/wd0a", "/dev/wd0a");
            let resolver = DeviceResolver::new(&bsd);

            let root = resolver.resolve("/", MatchBy::Mountpoint).expect("ffs");
            assert_eq!(root.kind, ActivityProbeKind::Unsupported, "{flavor:?}");
            assert_eq!(root.unsupported, Some(UnsupportedReason::NoActivitySource));
            assert_eq!(root.device, "/dev/wd0a");
            let tmp = resolver.resolve("/tmp", MatchBy::Mountpoint).expect("mfs");
            assert_eq!(tmp.unsupported, Some(UnsupportedReason::Virtual));
            let home = resolver.resolve("/home", MatchBy::Mountpoint).expect("nfs");
            assert_eq!(home.unsupported, Some(UnsupportedReason::NoActivitySource));
            assert_eq!(
                resolver.mountpoint_for_device("/dev/wd0a").expect("by device"),
                PathBuf::from("/")
            );
        }
    }

    #[test]
    fn hpux_resolves_every_filesystem_without_activity_source() {
        let hpux = MockPlatform::new(Flavor::HpUx);
        hpux.set_mounts(vec![
            MountEntry::new("/", "/dev/vg00/lvol3", "vxfs"),
            MountEntry::new("/net/a", "fileserver:/vol/a", "nfs"),
        ]);
        hpux.set_real_path("/dev/vg00/lvol3", "/dev/vg00/lvol3");
        let resolver = DeviceResolver::new(&hpux);
        for mountpoint in ["/", "/net/a"] {
            let resolved = resolver.resolve(mountpoint, MatchBy::Mountpoint).expect("resolves");
            assert_eq!(resolved.kind, ActivityProbeKind::Unsupported);
            assert_eq!(resolved.unsupported, Some(UnsupportedReason::NoActivitySource));
        }
        let by_device = resolver
            .resolve("/dev/vg00/lvol3", MatchBy::Device)
            .expect("device match");
        assert_eq!(by_device.mountpoint, Path::new("/"));
    }

    #[test]
    fn minor_and_whole_disk_helpers() {
        assert_eq!(solaris_minor("5200001"), Some(1));
        assert_eq!(solaris_minor("zz"), None);
        assert_eq!(whole_disk("disk12s3", "disk"), Some("disk12".to_string()));
        assert_eq!(whole_disk("da0", "da"), Some("da0".to_string()));
        assert_eq!(whole_disk("diskless", "disk"), None);
        assert_eq!(whole_disk("ada0p2", ""), None);
    }
}
