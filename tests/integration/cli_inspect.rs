#![allow(missing_docs)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use sc_memory::{AccessLevels, MemoryConfig, ScMemory, ScType};
use tempfile::TempDir;

fn seed_repo(dir: &Path) -> sc_memory::ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small().repo_path(dir))?;
    let ctx = memory.context(AccessLevels::MIN);
    let class = ctx.node_new(ScType::NODE_CONST_CLASS)?;
    for _ in 0..3 {
        let instance = ctx.node_new(ScType::NODE_CONST)?;
        ctx.connector_new(ScType::CONST_PERM_POS_ARC, class, instance)?;
    }
    memory.save()?;
    memory.shutdown()
}

fn setup() -> (TempDir, TempDir) {
    let repo = TempDir::new().expect("repo dir");
    seed_repo(repo.path()).expect("seed repo");
    let config_dir = TempDir::new().expect("config dir");
    MemoryConfig::small()
        .persist(config_dir.path().join("config.toml"))
        .expect("write config");
    (repo, config_dir)
}

#[test]
fn stats_reports_counts_as_json() {
    let (repo, config_dir) = setup();
    let output = cargo_bin_cmd!("sc-inspect")
        .env("SC_MEMORY_CONFIG", config_dir.path().join("config.toml"))
        .args(["--format", "json", "stats"])
        .arg(repo.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json output");
    // one class, three instances and the identifier relation node
    assert_eq!(json["stat"]["node_count"], 5);
    assert_eq!(json["stat"]["link_count"], 1);
    assert_eq!(json["stat"]["connector_count"], 5);
    assert_eq!(json["dump"]["elements"], 11);
}

#[test]
fn verify_passes_on_a_saved_repo() {
    let (repo, config_dir) = setup();
    let output = cargo_bin_cmd!("sc-inspect")
        .args(["--format", "json", "--config"])
        .arg(config_dir.path().join("config.toml"))
        .arg("verify")
        .arg(repo.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(json["consistent"], true);
    assert_eq!(json["elements_checked"], 11);
    assert_eq!(json["outgoing_total"], json["incoming_total"]);

    let text = cargo_bin_cmd!("sc-inspect")
        .arg("--config")
        .arg(config_dir.path().join("config.toml"))
        .arg("verify")
        .arg(repo.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&text).contains("status: PASS"));
}

#[test]
fn segments_lists_engaged_segments() {
    let (repo, config_dir) = setup();
    let output = cargo_bin_cmd!("sc-inspect")
        .env("SC_MEMORY_CONFIG", config_dir.path().join("config.toml"))
        .args(["--format", "json", "segments"])
        .arg(repo.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json output");
    let segments = json["segments"].as_array().expect("segment list");
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0]["num"], 1);
    assert_eq!(segments[0]["live"], 11);
}

#[test]
fn missing_dump_fails() {
    let empty = TempDir::new().expect("empty dir");
    let config_dir = TempDir::new().expect("config dir");
    MemoryConfig::small()
        .persist(config_dir.path().join("config.toml"))
        .expect("write config");
    let stderr = cargo_bin_cmd!("sc-inspect")
        .env("SC_MEMORY_CONFIG", config_dir.path().join("config.toml"))
        .arg("stats")
        .arg(empty.path())
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&stderr).contains("no dump found"));
}
