//! Child-process orchestration for `refresh` and `cycle`.

use crate::print_stdout;
use anyhow::{Context, Result};
use serde_json::json;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use threadmap_journal::AgentLogger;
use threadmap_protocol::{utc_timestamp, RepoLayout};

pub const BIN_ENV: &str = "THREADMAP_BIN";
pub const CYCLE_AGENT: &str = "agent-cycle";

/// Exit status reported when a child step fails.
pub const STEP_FAILED: i32 = 2;

fn local_binary_name() -> &'static str {
    if cfg!(windows) {
        "threadmap.exe"
    } else {
        "threadmap"
    }
}

/// Executable used for child steps: `$THREADMAP_BIN`, then the repository-local
/// `.github/copilot/.bin/threadmap`, then the running binary.
pub fn resolve_executable(layout: &RepoLayout) -> Result<PathBuf> {
    if let Some(bin) = std::env::var_os(BIN_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(bin));
    }
    let local = layout.bin_dir().join(local_binary_name());
    if local.is_file() {
        return Ok(local);
    }
    std::env::current_exe().context("Failed to locate the running threadmap executable")
}

fn display_command(exe: &Path, args: &[OsString]) -> String {
    std::iter::once(exe.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    // Killed by a signal: no code, treat as a failure.
    status.code().unwrap_or(-1)
}

/// Regenerate the runtime cache: `index --export-map --out-dir <runtime> <root>` in
/// a child process with captured output. Returns the exit status for the caller.
pub fn run_refresh(layout: &RepoLayout) -> Result<i32> {
    let runtime = layout.runtime_dir();
    std::fs::create_dir_all(runtime)
        .with_context(|| format!("Failed to create {}", runtime.display()))?;

    let exe = resolve_executable(layout)?;
    let args: Vec<OsString> = vec![
        "index".into(),
        "--export-map".into(),
        "--out-dir".into(),
        runtime.as_os_str().to_owned(),
        layout.root().as_os_str().to_owned(),
    ];
    print_stdout(&format!("Running: {}", display_command(&exe, &args)))?;

    let output = Command::new(&exe)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to start {}", exe.display()))?;
    std::io::stdout().write_all(&output.stdout).ok();

    if !output.status.success() {
        eprintln!(
            "Generator failed: {}",
            String::from_utf8_lossy(&output.stderr).trim_end()
        );
        return Ok(STEP_FAILED);
    }

    let stamp = layout.last_refreshed_path();
    std::fs::write(&stamp, format!("refreshed_at: {}", utc_timestamp()))
        .with_context(|| format!("Failed to write {}", stamp.display()))?;
    print_stdout(&format!(
        "Agent runtime cache updated at {}",
        runtime.display()
    ))?;
    Ok(0)
}

fn run_step(exe: &Path, args: &[OsString]) -> Result<i32> {
    print_stdout(&format!("Running: {}", display_command(exe, args)))?;
    Ok(match Command::new(exe).args(args).status() {
        Ok(status) => exit_code(status),
        Err(err) => {
            log::error!("Failed to start {}: {err}", exe.display());
            -1
        }
    })
}

/// Log `start`, run `refresh` then `summarize` one after the other, log `end` with
/// both return codes. Every step runs even if an earlier one failed.
pub fn run_cycle(layout: &RepoLayout) -> Result<i32> {
    let logs_dir = layout.logs_dir();
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create {}", logs_dir.display()))?;

    let logger = AgentLogger::new(layout, CYCLE_AGENT);
    logger.log(
        Some(CYCLE_AGENT),
        "start",
        json!({ "ts": utc_timestamp() }),
        json!(null),
    );

    let exe = resolve_executable(layout)?;
    let root = layout.root().as_os_str().to_owned();

    let rc_refresh = run_step(&exe, &["refresh".into(), root.clone()])?;
    if rc_refresh != 0 {
        print_stdout(&format!("refresh failed with code {rc_refresh}"))?;
    }
    let rc_summarizer = run_step(&exe, &["summarize".into(), root])?;
    if rc_summarizer != 0 {
        print_stdout(&format!("summarize failed with code {rc_summarizer}"))?;
    }

    logger.log(
        Some(CYCLE_AGENT),
        "end",
        json!({
            "rc_refresh": rc_refresh,
            "rc_summarizer": rc_summarizer,
            "ts": utc_timestamp(),
        }),
        json!(null),
    );

    Ok(if rc_refresh == 0 && rc_summarizer == 0 {
        0
    } else {
        STEP_FAILED
    })
}
