//! Mount-table records and the text grammars of the platform mount tables:
//! Linux `/proc/self/mounts`, Solaris `/etc/mnttab`, and `mount(8)` output.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{FsmonError, Result};

/// One mounted filesystem as listed by the platform mount table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountEntry {
    pub mountpoint: PathBuf,
    /// Raw source field: device node, `server:/export`, `//server/share`, dataset name.
    pub source: String,
    pub fs_type: String,
    pub options: Vec<String>,
}

impl MountEntry {
    #[must_use]
    pub fn new(
        mountpoint: impl Into<PathBuf>,
        source: impl Into<String>,
        fs_type: impl Into<String>,
    ) -> Self {
        Self {
            mountpoint: mountpoint.into(),
            source: source.into(),
            fs_type: fs_type.into(),
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|opt| (*opt).to_string()).collect();
        self
    }

    /// Value of a `key=value` mount option.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.iter().find_map(|opt| {
            opt.split_once('=')
                .filter(|(name, _)| *name == key)
                .map(|(_, value)| value)
        })
    }
}

/// Parse the fstab-format table exposed by Linux in `/proc/self/mounts`; HP-UX
/// writes `/etc/mnttab` in the same layout.
///
/// Entry order is preserved; callers rely on first-match semantics when
/// several filesystems are stacked on one mountpoint.
pub fn parse_proc_mounts(raw: &str) -> Vec<MountEntry> {
    let mut mounts = Vec::new();
    for line in raw.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            tracing::warn!("[FSM-MOUNTS] skipping malformed mount table line: {line}");
            continue;
        }
        mounts.push(MountEntry {
            mountpoint: unescape_mount_path(fields[1]),
            source: unescape_mount_path(fields[0])
                .to_string_lossy()
                .into_owned(),
            fs_type: fields[2].to_string(),
            options: fields
                .get(3)
                .map(|opts| opts.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        });
    }
    mounts
}

/// Parse Solaris/illumos `/etc/mnttab`: tab-separated
/// `special mount_point fstype options time`.
pub fn parse_mnttab(raw: &str) -> Vec<MountEntry> {
    let mut mounts = Vec::new();
    for line in raw.lines().filter(|line| !line.trim().is_empty()) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            tracing::warn!("[FSM-MOUNTS] skipping malformed mnttab line: {line}");
            continue;
        }
        mounts.push(MountEntry {
            mountpoint: PathBuf::from(fields[1]),
            source: fields[0].to_string(),
            fs_type: fields[2].to_string(),
            options: fields
                .get(3)
                .map(|opts| opts.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        });
    }
    mounts
}

struct MountPatterns {
    /// NetBSD/OpenBSD: `/dev/wd0a on / type ffs (local)`.
    typed: Regex,
    /// macOS/FreeBSD: `/dev/ada0p2 on / (ufs, local, soft-updates)`.
    parenthesized: Regex,
}

fn mount_patterns() -> Result<&'static MountPatterns> {
    static PATTERNS: OnceLock<std::result::Result<MountPatterns, String>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let typed = Regex::new(r"^(.+?) on (.+) type (\S+) \(([^)]*)\)$")
                .map_err(|err| err.to_string())?;
            let parenthesized = Regex::new(r"^(.+?) on (.+) \(([^,)]+)(?:, ([^)]*))?\)$")
                .map_err(|err| err.to_string())?;
            Ok(MountPatterns {
                typed,
                parenthesized,
            })
        })
        .as_ref()
        .map_err(|details| FsmonError::MountTableUnavailable {
            source_name: "mount(8)".to_string(),
            details: details.clone(),
        })
}

/// Parse the mount table as rendered by `mount(8)` on BSD-derived systems.
pub fn parse_mount_output(raw: &str) -> Result<Vec<MountEntry>> {
    let patterns = mount_patterns()?;
    let mut mounts = Vec::new();
    for line in raw.lines().map(str::trim_end).filter(|line| !line.is_empty()) {
        let Some(caps) = patterns
            .typed
            .captures(line)
            .or_else(|| patterns.parenthesized.captures(line))
        else {
            tracing::warn!("[FSM-MOUNTS] skipping unrecognized mount(8) line: {line}");
            continue;
        };
        let options = caps
            .get(4)
            .map(|opts| {
                opts.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|opt| !opt.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        mounts.push(MountEntry {
            mountpoint: PathBuf::from(&caps[2]),
            source: caps[1].to_string(),
            fs_type: caps[3].trim().to_string(),
            options,
        });
    }
    Ok(mounts)
}

/// Decode octal escape sequences (`\NNN`) used by the Linux kernel.
/// Returns a PathBuf via OsString to preserve raw bytes (e.g. invalid UTF-8).
pub(crate) fn unescape_mount_path(raw: &str) -> PathBuf {
    let mut bytes = Vec::with_capacity(raw.len());
    let raw_bytes = raw.as_bytes();
    let mut i = 0;
    while i < raw_bytes.len() {
        if raw_bytes[i] == b'\\' && i + 3 < raw_bytes.len() {
            let digits = &raw_bytes[i + 1..i + 4];
            if digits[0] <= b'3' && digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let val = (digits[0] - b'0') * 64 + (digits[1] - b'0') * 8 + (digits[2] - b'0');
                bytes.push(val);
                i += 4;
                continue;
            }
        }
        bytes.push(raw_bytes[i]);
        i += 1;
    }

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        PathBuf::from(std::ffi::OsString::from_vec(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
    }
}
