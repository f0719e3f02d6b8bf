//! ZFS pool counters and pool health.

use std::io;
use std::path::PathBuf;

use crate::core::errors::{FsmonError, Result};
use crate::monitor::activity::{ActivitySample, kstat};
use crate::monitor::context::MonitorContext;
use crate::monitor::resolver::ResolvedDevice;
use crate::platform::pal::Flavor;

fn spl_path(pool: &str, table: &str) -> PathBuf {
    PathBuf::from("/proc/spl/kstat/zfs").join(pool).join(table)
}

/// `Ok(None)` on Linux when the pool publishes no `io` kstat; OpenZFS 2.x
/// dropped it.
pub fn read(ctx: &MonitorContext, resolved: &ResolvedDevice) -> Result<Option<ActivitySample>> {
    let pool = resolved.canonical_key.as_str();
    observe_health(ctx, pool);

    match (ctx.platform().flavor(), resolved.kstat.as_ref()) {
        (Flavor::Solaris, Some(name)) => kstat::read(ctx, name).map(Some),
        (Flavor::Linux, _) => {
            let path = spl_path(pool, "io");
            let source = path.to_string_lossy().into_owned();
            let raw = match ctx.platform().read_text(&path) {
                Ok(raw) => raw,
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(FsmonError::io(&path, err)),
            };
            let fields = kstat::parse_spl_io(&raw)
                .ok_or_else(|| FsmonError::parse(&source, "no nread column header"))?;
            kstat::io_sample(&fields, &source, ctx.now_ms()).map(Some)
        }
        (flavor, _) => Err(FsmonError::parse(
            pool,
            format!("no pool statistics source on {}", flavor.as_str()),
        )),
    }
}

/// Current pool health string, e.g. `ONLINE` or `DEGRADED`.
pub fn pool_health(ctx: &MonitorContext, pool: &str) -> Result<String> {
    let platform = ctx.platform();
    if platform.flavor() == Flavor::Linux {
        let path = spl_path(pool, "state");
        if let Ok(state) = platform.read_text(&path) {
            return Ok(state.trim().to_string());
        }
    }
    let raw = platform.command_output("zpool", &["list", "-H", "-o", "health", pool])?;
    Ok(raw.trim().to_string())
}

/// Health never affects the counters; a pool that is not ONLINE is only
/// reported.
fn observe_health(ctx: &MonitorContext, pool: &str) {
    match pool_health(ctx, pool) {
        Ok(health) if health == "ONLINE" => {}
        Ok(health) => tracing::warn!("[FSM-ZFS] pool {pool} health is {health}"),
        Err(err) => tracing::debug!("[FSM-ZFS] pool {pool} health unknown: {err}"),
    }
}
