use medgraph::{GraphSnapshot, GraphStore, MemGraph};
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn medgraph() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_medgraph"));
    cmd.env_remove("MEDGRAPH_DB")
        .env_remove("MEDGRAPH_DATA_DIR")
        .env_remove("MEDGRAPH_BATCH_SIZE")
        .env_remove("MEDGRAPH_LOG");
    cmd
}

#[test]
fn t50_load_then_query() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hospital.mgraph");
    let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");

    let out = medgraph()
        .args(["--db", db.to_str().unwrap(), "load", "--data", data.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("patient_diagnoses"));

    let store = MemGraph::open(&db).unwrap();
    assert_eq!(store.snapshot().node_count(Some("PATIENT")), 4);
    drop(store);

    let out = medgraph()
        .env("MEDGRAPH_DB", &db)
        .args(["query", "disease-counts"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let rows: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["disease_name"], "Type 2 Diabetes");
    assert_eq!(rows[0]["num_patients"], 3);

    let out = medgraph()
        .args([
            "--db",
            db.to_str().unwrap(),
            "query",
            "recent-readings",
            "-p",
            "patient_id=P1",
            "-p",
            "count=1",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let row: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(row["has_vital_sign"][0]["reading_id"], "R3");
    assert_eq!(row["has_vital_sign"][0]["timestamp"], "2024-03-05T08:00:00Z");
}

#[test]
fn t51_unknown_query_fails() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("empty.mgraph");
    let out = medgraph()
        .args(["--db", db.to_str().unwrap(), "query", "nope"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown query"));
    assert!(!db.exists());
}

#[test]
fn t52_read_only_commands_leave_a_missing_db_alone() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("missing.mgraph");
    let out = medgraph()
        .args(["--db", db.to_str().unwrap(), "stats"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8(out.stdout).unwrap().contains("nodes: 0"));
    assert!(!db.exists());
}

#[test]
fn t53_default_db_lives_in_the_working_directory() {
    let dir = tempdir().unwrap();
    let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let out = medgraph()
        .current_dir(dir.path())
        .args(["load", "--data", data.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let db = dir
        .path()
        .join(format!("hospital.{}", medgraph::CHECKPOINT_EXTENSION));
    let store = MemGraph::open(&db).unwrap();
    assert_eq!(store.snapshot().node_count(Some("PATIENT")), 4);
}
