use pretty_assertions::assert_eq;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;
use threadmap_indexer::{IndexBuilder, IndexOptions};
use threadmap_protocol::{read_json, InferredMapExport, RepoLayout, ThreadsSource};

fn write_context(layout: &RepoLayout, name: &str, body: &str) {
    std::fs::create_dir_all(layout.contexts_dir()).expect("create contexts");
    std::fs::write(layout.contexts_dir().join(name), body).expect("write context");
}

fn seed_sessions(layout: &RepoLayout) {
    write_context(
        layout,
        "s1.md",
        "---\nsession_id: s1\nstatus: done\n---\n<!--machine-json-start-->\n{\"primary_thread\": \"A\", \"related_threads\": [\"B\"]}\n<!--machine-json-end-->\n",
    );
    write_context(
        layout,
        "s2.md",
        "---\nsession_id: s2\nactive_threads: [A, B]\n---\n",
    );
    write_context(layout, "s3.md", "---\nsession_id: s3\nactive_threads: [A]\n---\n");
}

fn read_value(path: &Path) -> Value {
    read_json(path).expect("read json").expect("file exists")
}

#[test]
fn inferred_index_links_threads_that_share_sessions() {
    let temp = TempDir::new().expect("tempdir");
    let layout = RepoLayout::new(temp.path());
    seed_sessions(&layout);

    let outcome = IndexBuilder::new(layout.clone(), IndexOptions::default())
        .expect("builder")
        .run()
        .expect("index");

    let index = read_value(&outcome.index_path);
    assert_eq!(index["metadata"]["threads_source"], "inferred_from_sessions");
    assert_eq!(index["metadata"]["generated_by"], "threadmap index");
    assert!(index["metadata"]["generated_at"]
        .as_str()
        .expect("timestamp")
        .ends_with('Z'));

    // A: 2 of 3 sessions with B (0.67); B: 2 of 2 with A.
    assert_eq!(
        index["threads"]["A"]["edges"],
        serde_json::json!([{"to": "B", "type": "directly_related", "weight": 1.0}])
    );
    assert_eq!(
        index["threads"]["B"]["recommended_expansion"],
        serde_json::json!(["A"])
    );
    let paths: Vec<_> = index["sessions"]
        .as_array()
        .expect("sessions")
        .iter()
        .map(|s| s["path"].as_str().expect("path").to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            ".github/copilot/contexts/s1.md",
            ".github/copilot/contexts/s2.md",
            ".github/copilot/contexts/s3.md",
        ]
    );
}

#[test]
fn repeated_runs_produce_identical_sessions_and_threads() {
    let temp = TempDir::new().expect("tempdir");
    let layout = RepoLayout::new(temp.path());
    seed_sessions(&layout);
    write_context(
        &layout,
        "loose notes.md",
        "---\nsession_id: loose\n---\nno threads here\n",
    );

    let run = || {
        let outcome = IndexBuilder::new(layout.clone(), IndexOptions::default())
            .expect("builder")
            .run()
            .expect("index");
        let index = read_value(&outcome.index_path);
        (
            serde_json::to_string(&index["sessions"]).expect("sessions"),
            serde_json::to_string(&index["threads"]).expect("threads"),
        )
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert!(first.1.contains("\"loose-notes\""));
}

#[test]
fn export_map_writes_inferred_provenance() {
    let temp = TempDir::new().expect("tempdir");
    let layout = RepoLayout::new(temp.path());
    seed_sessions(&layout);

    let options = IndexOptions {
        out_dir: Some(layout.runtime_dir().to_path_buf()),
        export_map: true,
        ..Default::default()
    };
    IndexBuilder::new(layout.clone(), options)
        .expect("builder")
        .run()
        .expect("index");

    let export: InferredMapExport =
        read_json(&layout.runtime_dir().join("thread-map.inferred.json"))
            .expect("read export")
            .expect("export exists");
    assert_eq!(export.provenance.source_sessions_count, 3);
    assert_eq!(export.threads["A"].count, 3);
    let to_b = &export.threads["A"].relations.directly_related[0];
    assert_eq!(to_b.name, "B");
    assert_eq!(to_b.count, 2);
    assert_eq!(
        to_b.examples,
        vec![
            ".github/copilot/contexts/s1.md",
            ".github/copilot/contexts/s2.md",
        ]
    );

    let last_run = read_value(&layout.last_run_path());
    assert_eq!(last_run["sessions_count"], 3);
    assert_eq!(last_run["threads_count"], 2);
}

#[test]
fn legacy_map_is_recorded_by_path() {
    let temp = TempDir::new().expect("tempdir");
    let layout = RepoLayout::new(temp.path());
    seed_sessions(&layout);
    let legacy = temp.path().join(".github").join("contexts");
    std::fs::create_dir_all(&legacy).expect("legacy dir");
    std::fs::write(
        legacy.join("thread-relationships.json"),
        r#"{"thread_relationships": {"A": {"directly_related": ["A", "C"], "often_related": ["C"]}}}"#,
    )
    .expect("write map");

    let options = IndexOptions {
        export_map: true,
        ..Default::default()
    };
    let outcome = IndexBuilder::new(layout, options)
        .expect("builder")
        .run()
        .expect("index");

    let document = &outcome.built.document;
    assert_eq!(
        document.metadata.threads_source,
        ThreadsSource::LegacyFile(".github/contexts/thread-relationships.json".into())
    );
    assert_eq!(document.threads.len(), 1);
    assert_eq!(document.threads["A"].recommended_expansion, vec!["C"]);
    let targets: Vec<_> = document.threads["A"]
        .edges
        .iter()
        .map(|e| e.to.as_str())
        .collect();
    assert_eq!(targets, vec!["A", "C", "C"]);
    assert!(!outcome
        .files_written
        .iter()
        .any(|f| f.ends_with("thread-map.inferred.json")));
}

#[test]
fn empty_repository_still_writes_an_index() {
    let temp = TempDir::new().expect("tempdir");
    let layout = RepoLayout::new(temp.path());

    let outcome = IndexBuilder::new(layout, IndexOptions::default())
        .expect("builder")
        .run()
        .expect("index");

    assert!(outcome.built.document.sessions.is_empty());
    assert!(outcome.built.document.threads.is_empty());
    assert!(outcome.index_path.exists());
}

#[test]
fn unusable_committed_map_falls_back_to_inference() {
    let temp = TempDir::new().expect("tempdir");
    let layout = RepoLayout::new(temp.path());
    seed_sessions(&layout);
    std::fs::write(layout.committed_map_path(), "{ not json").expect("write map");

    let built = IndexBuilder::new(layout.clone(), IndexOptions::default())
        .expect("builder")
        .build()
        .expect("build");
    assert_eq!(
        built.document.metadata.threads_source,
        ThreadsSource::InferredFromSessions
    );
    assert_eq!(built.skipped_maps.len(), 1);
    assert_eq!(built.skipped_maps[0].path, layout.committed_map_path());

    std::fs::write(layout.committed_map_path(), "{}").expect("write map");
    let built = IndexBuilder::new(layout, IndexOptions::default())
        .expect("builder")
        .build()
        .expect("build");
    assert_eq!(
        built.document.metadata.threads_source,
        ThreadsSource::InferredFromSessions
    );
    assert!(built.skipped_maps.is_empty());
    assert!(built.inference.is_some());
}
