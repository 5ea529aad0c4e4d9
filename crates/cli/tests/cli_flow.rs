use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn threadmap(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("threadmap").expect("binary");
    cmd.current_dir(root)
        .env_remove("THREADMAP_BIN")
        .env_remove("THREADMAP_ROOT")
        .env_remove("RUST_LOG");
    cmd
}

fn write_context(root: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let dir = root.join(".github/copilot/contexts");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn seed_sessions(root: &Path) {
    write_context(
        root,
        "s1.md",
        "---\nsession_id: s1\nactive_threads: [auth, db]\n---\nnotes\n",
    );
    write_context(
        root,
        "s2.md",
        "---\nsession_id: s2\nactive_threads: [auth, db]\n---\nmore notes\n",
    );
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).expect("valid json")
}

#[test]
fn validate_reports_ok_and_errors() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let good = write_context(root, "abc.md", "---\nsession_id: abc\n---\nbody\n");
    let bad = write_context(root, "other.md", "---\nstatus: open\n---\n");

    threadmap(root)
        .arg("validate")
        .arg(&good)
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: "))
        .stdout(predicate::str::contains("WARNING: corresponding chat log not found"));

    threadmap(root)
        .arg("validate")
        .arg(&bad)
        .arg(root)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "ERROR: session_id missing in frontmatter of",
        ));

    threadmap(root).arg("validate").assert().code(2);
}

#[test]
fn index_writes_document_and_last_run() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    seed_sessions(root);

    threadmap(root)
        .arg("index")
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let index = read_json(&root.join(".github/copilot/index.json"));
    assert_eq!(index["sessions"].as_array().unwrap().len(), 2);
    assert_eq!(
        index["threads"]["auth"]["edges"][0]["type"],
        Value::from("directly_related")
    );
    assert_eq!(index["metadata"]["threads_source"], Value::from("inferred_from_sessions"));

    let last_run = read_json(&root.join(".github/copilot/last_run.json"));
    assert_eq!(last_run["sessions_count"], Value::from(2));
    assert!(!root.join(".github/copilot/thread-map.inferred.json").exists());
}

#[test]
fn refresh_populates_runtime_cache_and_show_reads_it() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    seed_sessions(root);

    threadmap(root)
        .arg("refresh")
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Running: "))
        .stdout(predicate::str::contains("Agent runtime cache updated at"));

    let runtime = root.join(".github/copilot/runtime");
    assert!(runtime.join("index.json").exists());
    assert!(runtime.join("thread-map.inferred.json").exists());
    let stamp = fs::read_to_string(runtime.join("last_refreshed.txt")).unwrap();
    assert!(stamp.starts_with("refreshed_at: "));

    let output = threadmap(root)
        .args(["show", "threads"])
        .output()
        .expect("command run");
    assert!(output.status.success());
    let threads: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(threads, vec!["auth", "db"]);

    threadmap(root)
        .args(["show", "thread", "missing"])
        .assert()
        .code(1);
}

#[test]
fn cycle_logs_start_and_end_and_writes_summary() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    seed_sessions(root);

    threadmap(root).arg("cycle").arg(root).assert().success();

    let logs = root.join(".github/copilot/runtime/logs");
    let summary = read_json(&logs.join("summary.json"));
    assert_eq!(summary["by_agent"]["agent-cycle"], Value::from(1));
    assert_eq!(summary["by_action"]["start"], Value::from(1));

    let output = threadmap(root)
        .args(["log", "recent", "--limit", "5"])
        .output()
        .expect("command run");
    assert!(output.status.success());
    let entries: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    let actions: Vec<_> = entries.iter().map(|e| e["action"].clone()).collect();
    assert_eq!(actions, vec![Value::from("end"), Value::from("start")]);
    assert_eq!(entries[0]["details"]["rc_refresh"], Value::from(0));
    assert_eq!(entries[0]["details"]["rc_summarizer"], Value::from(0));
}

#[test]
fn log_write_then_tail() {
    let temp = tempdir().unwrap();
    let root = temp.path();

    threadmap(root)
        .args(["log", "write", "--action", "note", "--session", "s9"])
        .args(["--details", r#"{"msg": "hi"}"#, "--extra", "7"])
        .assert()
        .success();

    let output = threadmap(root)
        .args(["log", "tail", "-n", "3"])
        .output()
        .expect("command run");
    assert!(output.status.success());
    let entries: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["agent"], Value::from("threadmap"));
    assert_eq!(entries[0]["session"], Value::from("s9"));
    assert_eq!(entries[0]["details"]["msg"], Value::from("hi"));
    assert_eq!(entries[0]["extra"]["value"], Value::from(7));

    threadmap(root)
        .args(["log", "write", "--action", "x", "--details", "{oops"])
        .assert()
        .failure();
}

#[test]
fn summarize_without_logs_dir() {
    let temp = tempdir().unwrap();
    threadmap(temp.path())
        .arg("summarize")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("no logs dir"));
}

#[test]
fn schema_is_json() {
    let temp = tempdir().unwrap();
    let output = threadmap(temp.path())
        .arg("schema")
        .output()
        .expect("command run");
    assert!(output.status.success());
    let schema: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert!(schema.is_object());
}

#[cfg(unix)]
#[test]
fn failing_generator_exits_2_and_cycle_still_summarizes() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    seed_sessions(root);
    let runtime = root.join(".github/copilot/runtime");

    threadmap(root)
        .env("THREADMAP_BIN", "/bin/false")
        .arg("refresh")
        .arg(root)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Generator failed"));
    assert!(!runtime.join("last_refreshed.txt").exists());

    threadmap(root)
        .env("THREADMAP_BIN", "/bin/false")
        .arg("cycle")
        .arg(root)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("refresh failed with code"))
        .stdout(predicate::str::contains("summarize failed with code"));

    let output = threadmap(root)
        .args(["log", "recent", "--limit", "1"])
        .output()
        .expect("command run");
    assert!(output.status.success());
    let entries: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(entries[0]["action"], Value::from("end"));
    assert_ne!(entries[0]["details"]["rc_refresh"], Value::from(0));
    assert_ne!(entries[0]["details"]["rc_summarizer"], Value::from(0));
}

#[cfg(unix)]
#[test]
fn cycle_survives_a_closed_stdout() {
    use std::process::Stdio;

    let temp = tempdir().unwrap();
    let root = temp.path();
    seed_sessions(root);

    #[allow(deprecated)]
    let bin = assert_cmd::cargo::cargo_bin("threadmap");
    let mut child = std::process::Command::new(bin)
        .current_dir(root)
        .env_remove("THREADMAP_BIN")
        .env_remove("THREADMAP_ROOT")
        .arg("cycle")
        .arg(root)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn");
    drop(child.stdout.take());

    let status = child.wait().expect("wait");
    assert_eq!(status.code(), Some(0));
    assert!(root
        .join(".github/copilot/runtime/logs/summary.json")
        .exists());
}
