use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn setup_kb() -> TempDir {
    let temp = tempdir().unwrap();
    let kb = temp.path().join("kb");
    for (rel, content) in [
        ("quantitative/a.md", "Served 15000 people in 2024"),
        ("qualitative/b.md", "Our mission is housing stability"),
        ("contact/c.md", "Executive director: Jane Doe"),
    ] {
        let path = kb.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    temp
}

#[allow(deprecated)]
fn cli(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kb-retrieval").expect("binary");
    cmd.current_dir(workdir)
        .env_remove("GEMINI_API_KEY")
        .env_remove("KB_PATH")
        .env_remove("KB_CACHE_DIR")
        .env_remove("RUST_LOG")
        .env("KB_EMBEDDING_MODE", "stub")
        .arg("--kb-path")
        .arg(workdir.join("kb"))
        .arg("--cache-dir")
        .arg(workdir.join("cache"));
    cmd
}

fn run_json(workdir: &Path, args: &[&str]) -> Value {
    let output = cli(workdir).args(args).arg("--json").output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn fingerprint_needs_no_provider() {
    let temp = setup_kb();
    let mut cmd = cli(temp.path());
    cmd.env("KB_EMBEDDING_MODE", "gemini");
    let output = cmd.args(["fingerprint", "--json"]).output().unwrap();
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    let fingerprint = body["fingerprint"].as_str().unwrap();
    assert_eq!(fingerprint.len(), 64);
    assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(body["chunks"], 3);
}

#[test]
fn index_is_cached_across_runs() {
    let temp = setup_kb();
    let first = run_json(temp.path(), &["index"]);
    assert_eq!(first["source"], "provider");
    assert_eq!(first["chunks"], 3);
    assert_eq!(first["state"], "ready");
    assert_eq!(first["provider_id"], "stub-hash-256");

    let second = run_json(temp.path(), &["index"]);
    assert_eq!(second["source"], "cache");
    assert_eq!(second["fingerprint"], first["fingerprint"]);
}

#[test]
fn search_ranks_matching_passage_first() {
    let temp = setup_kb();
    let body = run_json(temp.path(), &["search", "How", "many", "people", "served?"]);
    assert_eq!(body["mode"], "semantic");
    let hits = body["hits"].as_array().unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0]["source_label"], "quantitative/a.md");
    assert_eq!(hits[0]["priority"], "quantitative");
}

#[test]
fn search_limit_is_respected() {
    let temp = setup_kb();
    let body = run_json(temp.path(), &["search", "housing", "-n", "1"]);
    assert_eq!(body["hits"].as_array().unwrap().len(), 1);
}

#[test]
fn retrieve_reports_sources_per_question() {
    let temp = setup_kb();
    let body = run_json(
        temp.path(),
        &["retrieve", "How many people served?", "What is the mission?"],
    );
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["question"], "How many people served?");
    assert!(!body["chunks"].as_array().unwrap().is_empty());
    assert_eq!(body["keyword_fallback"], false);
}

#[test]
fn human_output_lists_sources() {
    let temp = setup_kb();
    cli(temp.path())
        .args(["search", "people served"])
        .assert()
        .success()
        .stdout(contains("quantitative/a.md"));
}

#[test]
fn missing_knowledge_base_fails() {
    let temp = tempdir().unwrap();
    cli(temp.path())
        .args(["search", "anything"])
        .assert()
        .failure()
        .stderr(contains("Knowledge base root not found"));
}

#[test]
fn gemini_without_key_fails() {
    let temp = setup_kb();
    cli(temp.path())
        .env("KB_EMBEDDING_MODE", "gemini")
        .args(["index"])
        .assert()
        .failure()
        .stderr(contains("Missing API key"));
}

#[test]
fn config_file_is_picked_up_from_workdir() {
    let temp = setup_kb();
    fs::write(
        temp.path().join("kb-retrieval.toml"),
        "[ranking]\ndefault_top_k = 2\n",
    )
    .unwrap();
    let body = run_json(temp.path(), &["search", "housing"]);
    assert_eq!(body["hits"].as_array().unwrap().len(), 2);
}

#[test]
fn invalid_config_is_rejected() {
    let temp = setup_kb();
    fs::write(temp.path().join("bad.toml"), "[ranking]\ndefault_top_k = 0\n").unwrap();
    cli(temp.path())
        .args(["--config", "bad.toml", "index"])
        .assert()
        .failure()
        .stderr(contains("default_top_k"));
}
