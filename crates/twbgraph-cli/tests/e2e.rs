//! E2E tests for the `twbg` binary against the Superstore fixture.
//!
//! Covers: every subcommand's JSON shape, text output for pipes, coded
//! errors for bad input and unknown nodes, config overrides and the
//! timing report.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test harness helpers
// ---------------------------------------------------------------------------

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("superstore.twb")
}

fn twbg(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("twbg"));
    cmd.current_dir(dir);
    cmd.env("TWBG_LOG", "error");
    cmd.env_remove("TWBG_FORMAT");
    cmd.env_remove("TWBG_TIMING");
    cmd
}

fn json_of(dir: &Path, args: &[&str]) -> Value {
    let output = twbg(dir)
        .args(args)
        .args(["--format", "json"])
        .output()
        .expect("twbg should not crash");
    assert!(
        output.status.success(),
        "twbg {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

fn fixture_arg() -> String {
    fixture().display().to_string()
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[test]
fn stats_json_reports_counts_and_the_cycle_warning() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_of(dir.path(), &["stats", &fixture_arg()]);

    assert_eq!(json["node_count"], 20);
    assert_eq!(json["edge_count"], 22);
    assert_eq!(json["nodes_by_kind"]["CalculatedField"], 8);
    assert_eq!(json["edges_by_relation"]["USED_IN"], 7);
    assert_eq!(json["cycle_count"], 1);
    assert_eq!(json["warnings"].as_array().map(Vec::len), Some(1));
    assert!(json["content_hash"].as_str().is_some_and(|h| h.starts_with("blake3:")));
}

#[test]
fn graph_json_is_the_wire_format() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_of(dir.path(), &["graph", &fixture_arg()]);

    let nodes = json["nodes"].as_array().expect("nodes");
    let edges = json["edges"].as_array().expect("edges");
    assert_eq!(nodes.len(), 20);
    assert_eq!(edges.len(), 22);

    let regional = nodes
        .iter()
        .find(|n| n["id"] == "Calculation_1003")
        .expect("regional sales");
    assert_eq!(regional["type"], "CalculatedField");
    assert_eq!(regional["isLOD"], true);
    assert_eq!(regional["rawName"], "[Calculation_1003]");
}

#[test]
fn graph_out_writes_a_file_that_normalize_accepts() {
    let dir = TempDir::new().expect("tempdir");
    let out = dir.path().join("graph.json");
    twbg(dir.path())
        .args(["graph", &fixture_arg(), "-o"])
        .arg(&out)
        .assert()
        .success();

    let json = json_of(dir.path(), &["normalize", "graph.json"]);
    assert_eq!(json["graph"]["nodes"].as_array().map(Vec::len), Some(20));
    assert_eq!(json["report"]["dangling_edges"], 0);
    assert_eq!(json["cycles"].as_array().map(Vec::len), Some(1));
}

#[test]
fn metadata_json_has_the_parsed_model() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_of(dir.path(), &["metadata", &fixture_arg()]);
    assert_eq!(json["datasources"][0]["caption"], "Sample - Superstore");
    assert_eq!(json["parameters"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["dashboards"][1]["worksheets"][0], "Targets");
}

#[test]
fn cycles_text_names_the_loop() {
    let dir = TempDir::new().expect("tempdir");
    twbg(dir.path())
        .args(["cycles", &fixture_arg(), "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Circular dependencies (1)"))
        .stdout(predicate::str::contains("Calculation_1007"))
        .stdout(predicate::str::contains("Calculation_1008"));
}

#[test]
fn neighbors_resolves_names() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_of(dir.path(), &["neighbors", &fixture_arg(), "Profit Ratio"]);

    assert_eq!(json["node"]["id"], "Calculation_1002");
    assert_eq!(json["depth"], 1);
    let ids: Vec<&str> = json["nodes"]
        .as_array()
        .expect("nodes")
        .iter()
        .filter_map(|n| n["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["Calculation_1001", "Calculation_1002", "Sales"]);
    assert_eq!(json["upstream"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["downstream"].as_array().map(Vec::len), Some(0));
}

#[test]
fn neighbors_depth_is_clamped() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_of(
        dir.path(),
        &["neighbors", &fixture_arg(), "Sales", "--depth", "50"],
    );
    assert_eq!(json["depth"], 10);
    assert_eq!(json["truncated"], false);
}

#[test]
fn unknown_node_fails_with_a_code() {
    let dir = TempDir::new().expect("tempdir");
    twbg(dir.path())
        .args(["neighbors", &fixture_arg(), "No Such Field", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E5001"))
        .stderr(predicate::str::contains("twbg search"));
}

#[test]
fn rank_text_starts_with_dashboards() {
    let dir = TempDir::new().expect("tempdir");
    let output = twbg(dir.path())
        .args(["rank", &fixture_arg(), "--format", "text"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "0\tExecutive Summary");
    assert_eq!(lines[1], "0\tPlanning");
    assert!(lines.contains(&"4\tRow ID"));
}

#[test]
fn rank_from_selection_walks_downstream() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_of(dir.path(), &["rank", &fixture_arg(), "--from", "Order Date"]);
    assert_eq!(json["mode"], "selection");
    assert_eq!(json["layers"]["1"][0], "Trend");
    assert_eq!(json["layers"]["2"][0], "Executive Summary");
}

#[test]
fn search_lists_prefix_matches_first() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_of(dir.path(), &["search", &fixture_arg(), "sales", "-n", "2"]);
    let results = json["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["name"], "Sales");
    assert_eq!(results[1]["name"], "Sales Target");
}

// ---------------------------------------------------------------------------
// Errors, config and timing
// ---------------------------------------------------------------------------

#[test]
fn unsupported_extension_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "<workbook/>").expect("write");

    twbg(dir.path())
        .args(["stats", "notes.txt", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1002"));
}

#[test]
fn malformed_markup_reports_json_error() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("broken.twb"), "<workbook><datasources>").expect("write");

    let output = twbg(dir.path())
        .args(["graph", "broken.twb", "--format", "json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"error_code\": \"E2001\""), "{stderr}");
}

#[test]
fn config_size_limit_is_enforced() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(
        dir.path().join("twbgraph.toml"),
        "[limits]\nmax_file_bytes = 1024\nwarn_file_bytes = 512\n",
    )
    .expect("write config");

    twbg(dir.path())
        .args(["stats", &fixture_arg(), "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3001"));
}

#[test]
fn explicit_config_must_exist() {
    let dir = TempDir::new().expect("tempdir");
    twbg(dir.path())
        .args(["--config", "missing.toml", "stats", &fixture_arg()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"))
        .stderr(predicate::str::contains("E4001"));
}

#[test]
fn invalid_config_is_a_coded_error() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("twbgraph.toml"), "[limits\nmax_file_bytes =").expect("write");
    twbg(dir.path())
        .args(["stats", &fixture_arg()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E4001]"))
        .stderr(predicate::str::contains("Failed to parse"));
}

#[test]
fn normalize_repairs_a_broken_payload() {
    let dir = TempDir::new().expect("tempdir");
    let payload = r#"{
        "nodes": [
            {"id": "a", "type": "Field", "name": "A"},
            {"id": "a", "type": "Field", "name": "A again"},
            {"id": "", "type": "Field", "name": "Nameless"},
            {"id": "b", "type": "CalculatedField", "name": "B"}
        ],
        "edges": [
            {"source": "a", "target": "b", "rel": "FEEDS"},
            {"source": "a", "target": "b", "rel": "FEEDS"},
            {"source": "a", "target": "ghost", "rel": "FEEDS"}
        ]
    }"#;
    std::fs::write(dir.path().join("g.json"), payload).expect("write");

    let json = json_of(dir.path(), &["normalize", "g.json"]);
    assert_eq!(json["graph"]["nodes"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["graph"]["edges"][0]["id"], "a->b:FEEDS");
    assert_eq!(json["report"]["duplicate_nodes"], 1);
    assert_eq!(json["report"]["missing_node_ids"], 1);
    assert_eq!(json["report"]["dangling_edges"], 1);
    assert_eq!(json["report"]["duplicate_edges"], 1);
    assert_eq!(json["graph"]["edges"].as_array().map(Vec::len), Some(1));
}

#[test]
fn normalize_rejects_non_graph_json() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("g.json"), "[1, 2, 3]").expect("write");
    twbg(dir.path())
        .args(["normalize", "g.json", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a graph payload"));
}

#[test]
fn timing_flag_prints_a_report() {
    let dir = TempDir::new().expect("tempdir");
    twbg(dir.path())
        .args(["--timing", "stats", &fixture_arg(), "--format", "text"])
        .assert()
        .success()
        .stderr(predicate::str::contains("timing report:"))
        .stderr(predicate::str::contains("cmd.stats"))
        .stderr(predicate::str::contains("parse"));
}
