//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use fsmon::core::config::{Config, FilesystemTarget};
use fsmon::core::errors::FsmonError;
use fsmon::daemon::loop_main::{self, WatchLoop};
use fsmon::daemon::signals::SignalHandler;
use fsmon::monitor::context::MonitorContext;
use fsmon::monitor::filesystem::{FilesystemReport, MonitorSet, MonitorState, PollOutcome};
use fsmon::monitor::mount_cache::RunMode;
use fsmon::monitor::resolver::{ActivityProbeKind, DeviceResolver, MatchBy, ResolvedDevice};
use fsmon::platform::clock::MonotonicClock;
use fsmon::platform::mount_table::MountEntry;
use fsmon::platform::pal::detect_platform;

/// fsmon: filesystem usage and I/O activity monitor.
#[derive(Debug, Parser)]
#[command(
    name = "fsmon",
    author,
    version,
    about = "Filesystem usage and I/O activity monitor",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Poll filesystems once and report usage and activity counters.
    Check(CheckArgs),
    /// Poll filesystems every interval until interrupted.
    Watch(WatchArgs),
    /// List the current mount table.
    Mounts,
    /// Show how a mount point or device resolves to an activity source.
    Resolve(ResolveArgs),
    /// Generate shell completion scripts.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct CheckArgs {
    /// Mount points to check (falls back to configured filesystems when omitted).
    #[arg(value_name = "PATH")]
    paths: Vec<String>,
    /// Treat PATH arguments as device names instead of mount points.
    #[arg(long)]
    device: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct WatchArgs {
    /// Mount points to watch (falls back to configured filesystems when omitted).
    #[arg(value_name = "PATH")]
    paths: Vec<String>,
    /// Treat PATH arguments as device names instead of mount points.
    #[arg(long)]
    device: bool,
    /// Delay between polling cycles (defaults to `monitor.poll_interval_ms`).
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,
    /// Stop after N cycles.
    #[arg(long, value_name = "N")]
    count: Option<u64>,
}

#[derive(Debug, Clone, Args, Serialize)]
struct ResolveArgs {
    /// Mount point (or device with --device) to resolve.
    #[arg(value_name = "PATH")]
    path: String,
    /// Treat PATH as a device name.
    #[arg(long)]
    device: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Monitoring library failure.
    #[error(transparent)]
    Monitor(#[from] FsmonError),
    /// Some filesystems could not be polled.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) | Self::Partial(_) => 1,
            Self::Monitor(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if let Command::Completions(args) = &cli.command {
        let mut command = Cli::command();
        let binary_name = command.get_name().to_string();
        generate(args.shell, &mut command, binary_name, &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    init_logging(cli, &config);

    match &cli.command {
        Command::Check(args) => run_check(cli, &config, args),
        Command::Watch(args) => run_watch(cli, &config, args),
        Command::Mounts => run_mounts(cli),
        Command::Resolve(args) => run_resolve(cli, args),
        Command::Completions(_) => Ok(()),
    }
}

/// `-q`/`-v` pin the level; otherwise `FSMON_LOG`, then `RUST_LOG`, then the
/// configured level.
fn init_logging(cli: &Cli, config: &Config) {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("FSMON_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn match_by(device: bool) -> MatchBy {
    if device {
        MatchBy::Device
    } else {
        MatchBy::Mountpoint
    }
}

fn select_targets(
    config: &Config,
    paths: &[String],
    device: bool,
) -> Result<Vec<FilesystemTarget>, CliError> {
    if paths.is_empty() {
        if config.filesystems.is_empty() {
            return Err(CliError::User(
                "no filesystems given and none configured in [[filesystems]]".to_string(),
            ));
        }
        return Ok(config.filesystems.clone());
    }
    Ok(paths
        .iter()
        .map(|path| FilesystemTarget {
            path: path.clone(),
            match_by: match_by(device),
        })
        .collect())
}

fn build_context(config: &Config, mode: RunMode) -> Result<MonitorContext, CliError> {
    let platform = detect_platform()?;
    Ok(MonitorContext::from_config(
        platform,
        Arc::new(MonotonicClock),
        mode,
        &config.monitor,
    ))
}

// ---------------------------------------------------------------------------
// check / watch
// ---------------------------------------------------------------------------

fn run_check(cli: &Cli, config: &Config, args: &CheckArgs) -> Result<(), CliError> {
    let targets = select_targets(config, &args.paths, args.device)?;
    let ctx = build_context(config, RunMode::Oneshot)?;
    let mut monitors = MonitorSet::from_targets(&targets);

    let outcomes = monitors.poll_all(&ctx);
    emit_cycle(output_mode(cli), "check", None, &ctx, &monitors, &outcomes)?;

    let failed = outcomes.iter().filter(|outcome| !outcome.success).count();
    if failed > 0 {
        return Err(CliError::Partial(format!(
            "{failed} of {} filesystem(s) could not be polled",
            outcomes.len()
        )));
    }
    Ok(())
}

fn run_watch(cli: &Cli, config: &Config, args: &WatchArgs) -> Result<(), CliError> {
    let targets = select_targets(config, &args.paths, args.device)?;
    let ctx = build_context(config, RunMode::Persistent)?;
    let monitors = MonitorSet::from_targets(&targets);
    let interval = Duration::from_millis(
        args.interval_ms
            .unwrap_or(config.monitor.poll_interval_ms),
    );

    let signals = SignalHandler::new();
    let stopper = signals.clone();
    let mode = output_mode(cli);
    let mut watch_loop = WatchLoop::new(
        ctx,
        monitors,
        signals,
        loop_main::WatchArgs {
            interval,
            max_cycles: args.count,
        },
    );

    let mut write_error = None;
    let summary = watch_loop.run(|cycle, ctx, monitors, outcomes| {
        if let Err(err) = emit_cycle(mode, "watch", Some(cycle), ctx, monitors, outcomes) {
            // stdout went away (closed pipe); stop instead of polling blind.
            write_error = Some(err);
            stopper.request_shutdown();
        }
    });
    if let Some(err) = write_error {
        return Err(err);
    }

    tracing::info!(
        "[FSM-WATCH] stopped after {} cycle(s), {} failed poll(s)",
        summary.cycles,
        summary.failed_polls
    );
    Ok(())
}

fn emit_cycle(
    mode: OutputMode,
    command: &str,
    cycle: Option<u64>,
    ctx: &MonitorContext,
    monitors: &MonitorSet,
    outcomes: &[PollOutcome],
) -> Result<(), CliError> {
    let reports = monitors.reports(ctx);
    match mode {
        OutputMode::Human => {
            let mut stdout = io::stdout().lock();
            if let Some(cycle) = cycle {
                writeln!(stdout, "-- cycle {cycle} --")?;
            }
            for (report, outcome) in reports.iter().zip(outcomes) {
                write!(stdout, "{}", format_report_human(report, outcome))?;
            }
            stdout.flush()?;
        }
        OutputMode::Json => {
            let filesystems = reports
                .iter()
                .zip(outcomes)
                .map(|(report, outcome)| {
                    let mut value = serde_json::to_value(report)?;
                    if let Value::Object(map) = &mut value {
                        map.insert("outcome".to_string(), serde_json::to_value(outcome)?);
                    }
                    Ok(value)
                })
                .collect::<Result<Vec<_>, serde_json::Error>>()?;
            let payload = json!({
                "command": command,
                "cycle": cycle,
                "observed_at": chrono::Utc::now().to_rfc3339(),
                "generation": ctx.current_generation(),
                "filesystems": filesystems,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn format_report_human(report: &FilesystemReport, outcome: &PollOutcome) -> String {
    let mut out = String::new();
    let status = if outcome.success { "ok" } else { "FAILED" };
    let state = match report.state {
        MonitorState::Unresolved => "unresolved",
        MonitorState::Resolved { mounted: true } => "mounted",
        MonitorState::Resolved { mounted: false } => "not mounted",
        MonitorState::Stale => "stale",
    };

    match &report.record.resolved {
        Some(resolved) => out.push_str(&format!(
            "{} [{status}] {} ({}, {}, {state})\n",
            resolved.mountpoint.display(),
            resolved.device,
            resolved.fs_type,
            kind_label(resolved.kind),
        )),
        None => out.push_str(&format!("{} [{status}] {state}\n", report.record.query)),
    }

    if let Some(usage) = &report.usage {
        out.push_str(&format!(
            "  space   {:>5.1}% used of {}, {} available{}\n",
            usage.space_used_pct(),
            format_bytes(usage.total_bytes()),
            format_bytes(usage.available_bytes()),
            if usage.is_read_only() { " (read-only)" } else { "" },
        ));
        out.push_str(&format!(
            "  inodes  {:>5.1}% used of {}\n",
            usage.inodes_used_pct(),
            usage.total_inodes
        ));
    }

    let activity = &report.activity;
    if activity.read_bytes.raw.is_some() || activity.write_bytes.raw.is_some() {
        out.push_str(&format!(
            "  read    {}  {}\n",
            format_rate_bytes(activity.read_bytes.per_second),
            format_rate_ops(activity.read_ops.per_second),
        ));
        out.push_str(&format!(
            "  write   {}  {}\n",
            format_rate_bytes(activity.write_bytes.per_second),
            format_rate_ops(activity.write_ops.per_second),
        ));
    }
    out
}

const fn kind_label(kind: ActivityProbeKind) -> &'static str {
    match kind {
        ActivityProbeKind::Block => "block",
        ActivityProbeKind::Nfs => "nfs",
        ActivityProbeKind::Cifs => "cifs",
        ActivityProbeKind::Zfs => "zfs",
        ActivityProbeKind::Registry => "registry",
        ActivityProbeKind::Unsupported => "no activity source",
    }
}

// ---------------------------------------------------------------------------
// mounts / resolve
// ---------------------------------------------------------------------------

fn run_mounts(cli: &Cli) -> Result<(), CliError> {
    let platform = detect_platform()?;
    let mounts = platform.mount_table()?;
    match output_mode(cli) {
        OutputMode::Human => print!("{}", format_mounts_human(&mounts)),
        OutputMode::Json => {
            let payload = json!({
                "command": "mounts",
                "observed_at": chrono::Utc::now().to_rfc3339(),
                "platform": platform.flavor().as_str(),
                "mounts": mounts,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn format_mounts_human(mounts: &[MountEntry]) -> String {
    let width = mounts
        .iter()
        .map(|entry| entry.mountpoint.to_string_lossy().len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for entry in mounts {
        out.push_str(&format!(
            "{:<width$}  {:<10}  {}\n",
            entry.mountpoint.display().to_string(),
            entry.fs_type,
            entry.source,
        ));
    }
    out
}

fn run_resolve(cli: &Cli, args: &ResolveArgs) -> Result<(), CliError> {
    let platform = detect_platform()?;
    let resolved = DeviceResolver::new(platform.as_ref()).resolve(&args.path, match_by(args.device))?;
    match output_mode(cli) {
        OutputMode::Human => print!("{}", format_resolved_human(&resolved)),
        OutputMode::Json => {
            let payload = json!({
                "command": "resolve",
                "query": args.path,
                "match_by": match_by(args.device),
                "resolved": resolved,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn format_resolved_human(resolved: &ResolvedDevice) -> String {
    let mut out = format!(
        "mountpoint:    {}\ndevice:        {}\nfs type:       {}\nsource:        {}\n",
        resolved.mountpoint.display(),
        resolved.device,
        resolved.fs_type,
        kind_label(resolved.kind),
    );
    if !resolved.canonical_key.is_empty() {
        out.push_str(&format!("canonical key: {}\n", resolved.canonical_key));
    }
    if let Some(kstat) = &resolved.kstat {
        out.push_str(&format!(
            "kstat:         {}:{}:{}\n",
            kstat.module, kstat.instance, kstat.name
        ));
    }
    if let Some(reason) = resolved.unsupported {
        out.push_str(&format!("unsupported:   {reason:?}\n"));
    }
    out
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    const TIB: u64 = 1024 * GIB;

    if bytes >= TIB {
        format!("{:.1} TB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn format_rate_bytes(rate: Option<f64>) -> String {
    rate.map_or_else(
        || "     -/s".to_string(),
        |rate| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let bytes = rate.max(0.0).round() as u64;
            format!("{:>8}/s", format_bytes(bytes))
        },
    )
}

fn format_rate_ops(rate: Option<f64>) -> String {
    rate.map_or_else(|| "- ops/s".to_string(), |rate| format!("{rate:.1} ops/s"))
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("FSMON_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use fsmon::monitor::activity::ActivityCounters;
    use fsmon::monitor::filesystem::FilesystemRecord;
    use fsmon::monitor::resolver::UnsupportedReason;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "fsmon",
            "--config",
            "/tmp/fsmon.toml",
            "--json",
            "-v",
            "mounts",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["fsmon", "mounts", "--json", "-q"]);
        assert!(after.is_ok());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["fsmon", "-v", "-q", "mounts"]).is_err());
    }

    #[test]
    fn parses_subcommands() {
        let cases = [
            vec!["fsmon", "check", "/", "/var"],
            vec!["fsmon", "check", "--device", "/dev/sda1"],
            vec!["fsmon", "watch", "--interval-ms", "500", "--count", "3"],
            vec!["fsmon", "watch", "/data"],
            vec!["fsmon", "resolve", "/home"],
            vec!["fsmon", "resolve", "--device", "tank"],
            vec!["fsmon", "completions", "bash"],
        ];
        for case in cases {
            assert!(Cli::try_parse_from(&case).is_ok(), "failed to parse {case:?}");
        }
    }

    #[test]
    fn resolve_requires_a_path() {
        assert!(Cli::try_parse_from(["fsmon", "resolve"]).is_err());
    }

    #[test]
    fn watch_args_are_captured() {
        let cli = Cli::try_parse_from(["fsmon", "watch", "/a", "--interval-ms", "250", "--count", "2"])
            .expect("parse");
        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.paths, vec!["/a".to_string()]);
        assert_eq!(args.interval_ms, Some(250));
        assert_eq!(args.count, Some(2));
        assert!(!args.device);
    }

    #[test]
    fn json_flag_wins_over_environment() {
        assert_eq!(resolve_output_mode(true, Some("human"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("HUMAN"), false), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, Some("json"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, None, true), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, Some("bogus"), false), OutputMode::Json);
    }

    #[test]
    fn explicit_paths_override_configured_filesystems() {
        let mut config = Config::default();
        config.filesystems.push(FilesystemTarget {
            path: "/configured".to_string(),
            match_by: MatchBy::Mountpoint,
        });

        let targets = select_targets(&config, &["sda1".to_string()], true).expect("targets");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].path, "sda1");
        assert_eq!(targets[0].match_by, MatchBy::Device);

        let fallback = select_targets(&config, &[], false).expect("configured");
        assert_eq!(fallback[0].path, "/configured");
    }

    #[test]
    fn no_targets_is_a_user_error() {
        let err = select_targets(&Config::default(), &[], false).expect_err("empty");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::Partial("x".to_string()).exit_code(), 1);
        let monitor = CliError::from(FsmonError::NotFound {
            query: "/nope".to_string(),
        });
        assert_eq!(monitor.exit_code(), 2);
        assert!(monitor.to_string().contains("FSM-2002"));
    }

    #[test]
    fn format_bytes_ranges() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn unresolved_report_prints_query() {
        let report = FilesystemReport {
            record: FilesystemRecord {
                query: "/missing".to_string(),
                match_by: MatchBy::Mountpoint,
                resolved: None,
                mounted: false,
                cache_generation: 0,
            },
            state: MonitorState::Resolved { mounted: false },
            usage: None,
            activity: ActivityCounters::default().view(),
        };
        let outcome = PollOutcome {
            success: false,
            mounted: false,
        };
        let text = format_report_human(&report, &outcome);
        assert_eq!(text, "/missing [FAILED] not mounted\n");
    }

    #[test]
    fn resolved_device_lists_unsupported_reason() {
        let resolved = ResolvedDevice {
            mountpoint: PathBuf::from("/tmp"),
            device: "tmpfs".to_string(),
            canonical_key: String::new(),
            fs_type: "tmpfs".to_string(),
            kind: ActivityProbeKind::Unsupported,
            kstat: None,
            unsupported: Some(UnsupportedReason::Virtual),
        };
        let text = format_resolved_human(&resolved);
        assert!(text.contains("mountpoint:    /tmp"));
        assert!(text.contains("unsupported:   Virtual"));
        assert!(!text.contains("canonical key"));
    }
}
