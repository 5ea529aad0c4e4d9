use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use threadmap_journal::{read_recent, summarize, AgentLogger};
use threadmap_protocol::RepoLayout;

#[test]
fn two_agents_share_the_day_file_and_summary_counts_both() {
    let temp = TempDir::new().expect("tempdir");
    let layout = RepoLayout::new(temp.path());
    let cycle = AgentLogger::new(&layout, "agent-cycle");
    let reviewer = AgentLogger::new(&layout, "reviewer");

    cycle.log(Some("agent-cycle"), "start", json!({"ts": "now"}), json!(null));
    reviewer.log(Some("s-7"), "note", json!({"msg": "looked"}), json!(null));
    cycle.log(
        Some("agent-cycle"),
        "end",
        json!({"rc_refresh": 0, "rc_summarizer": 0}),
        json!(null),
    );

    assert_eq!(cycle.day_file(), reviewer.day_file());
    let today = cycle.tail(10).expect("tail");
    let agents: Vec<_> = today.iter().map(|e| e.agent.as_str()).collect();
    assert_eq!(agents, vec!["agent-cycle", "reviewer", "agent-cycle"]);

    let recent = read_recent(&layout.logs_dir(), 2).expect("recent");
    let actions: Vec<_> = recent.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["end", "note"]);

    let summary = summarize(&layout).expect("summarize").expect("logs dir exists");
    assert_eq!(summary.total_entries, 3);
    assert_eq!(summary.by_agent["agent-cycle"], 2);
    assert_eq!(summary.by_action["note"], 1);
    assert!(summary.first_ts <= summary.last_ts);
    assert!(layout.summary_path().exists());
}
