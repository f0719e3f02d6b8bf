#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use fsmon::monitor::context::MonitorContext;
use fsmon::monitor::mount_cache::RunMode;
use fsmon::platform::clock::ManualClock;
use fsmon::platform::pal::{Flavor, MockPlatform};
use fsmon::platform::usage::RawUsage;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_fsmon") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "fsmon.exe" } else { "fsmon" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve fsmon binary path for integration test"),
    }
}

/// Run the CLI with a scratch HOME so no user config leaks in.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("fsmon-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");
    let home = root.join(format!("home-{}-{}", sanitize(case_name), now_millis()));
    fs::create_dir_all(&home).expect("create scratch home");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("HOME", &home)
        .env_remove("FSMON_OUTPUT_FORMAT")
        .env_remove("FSMON_LOG")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute fsmon command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Statfs result with equal block and fragment sizes.
pub fn usage(block_size: u64, blocks: u64, available: u64) -> RawUsage {
    RawUsage {
        block_size,
        fragment_size: block_size,
        blocks,
        blocks_free: available,
        blocks_available: available,
        files: 1_000,
        files_free: 900,
        flags: 0,
    }
}

/// Mock platform plus a manual clock wired into a one-shot context.
pub fn mock_context(flavor: Flavor) -> (Arc<MockPlatform>, Arc<ManualClock>, MonitorContext) {
    let mock = Arc::new(MockPlatform::new(flavor));
    let clock = Arc::new(ManualClock::new(1_000));
    let ctx = MonitorContext::new(mock.clone(), clock.clone(), RunMode::Oneshot);
    (mock, clock, ctx)
}
