use std::path::{Path, PathBuf};

use notebookify::formats::{Notebook, Section};
use notebookify::store;
use predicates::prelude::*;

mod fixtures;

fn write_fixture(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    store::save(&path, &fixtures::calculus())?;
    Ok(path)
}

fn write_request(dir: &Path, request: serde_json::Value) -> anyhow::Result<PathBuf> {
    let path = dir.join("request.json");
    std::fs::write(&path, serde_json::to_string(&request)?)?;
    Ok(path)
}

#[test]
fn render_tagged_prints_id_markers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notebook = write_fixture(dir.path(), "calculus.yaml")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["render", "--tagged", "--notebook"])
        .arg(&notebook)
        .assert()
        .success()
        .stdout(predicate::str::contains("<Section id=\"s1\">"))
        .stdout(predicate::str::contains("<Definition id=\"d1\">\nD1\n</Definition>"));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["render", "--notebook"])
        .arg(&notebook)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Calculus\n"))
        .stdout(predicate::str::contains("<Section").not());
    Ok(())
}

#[test]
fn ids_backfills_legacy_notebook() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("legacy.json");
    let mut legacy = Notebook {
        title: "Legacy".to_owned(),
        ..Notebook::default()
    };
    legacy.sections.insert(
        "Only",
        Section {
            title: "Only".to_owned(),
            introduction: "Old content.".to_owned(),
            ..Section::default()
        },
    );
    store::save(&path, &legacy)?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["ids", "--notebook"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"backfilled\":4"))
        .stdout(predicate::str::contains("\"added\":[\"Only\"]"));

    let loaded = store::load(&path)?;
    let section = loaded.sections.get("Only").expect("section kept");
    assert!(section.id.is_some());
    assert_eq!(
        loaded.outline.sections.get("Only").map(String::as_str),
        Some("Old content.")
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["check", "--notebook"])
        .arg(&path)
        .assert()
        .success()
        .stdout("ok\n");
    Ok(())
}

#[test]
fn locate_prints_field_match() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notebook = write_fixture(dir.path(), "calculus.yml")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["locate", "--id", "d1", "--notebook"])
        .arg(&notebook)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"field\":\"definition\""))
        .stdout(predicate::str::contains("\"kind\":\"concept_block\""))
        .stdout(predicate::str::contains("\"node_id\":\"b1\""));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["locate", "--id", "nope", "--notebook"])
        .arg(&notebook)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no node or field has id `nope`"));
    Ok(())
}

#[test]
fn apply_updates_and_writes_back() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notebook = write_fixture(dir.path(), "calculus.yaml")?;
    let request = write_request(
        dir.path(),
        serde_json::json!({
            "action": "update",
            "id": "d1",
            "field": "definition",
            "value": "D2",
        }),
    )?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["apply", "--notebook"])
        .arg(&notebook)
        .arg("--request")
        .arg(&request)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fingerprint\":\""));

    let loaded = store::load(&notebook)?;
    let block = &loaded.sections.get("S1").expect("S1").concept_blocks[0];
    assert_eq!(block.definition, "D2");
    Ok(())
}

#[test]
fn apply_create_reads_request_from_stdin() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notebook = write_fixture(dir.path(), "calculus.json")?;
    let before = std::fs::read_to_string(&notebook)?;
    let out = dir.path().join("edited.json");
    let request = serde_json::json!({
        "action": "create",
        "kind": "example",
        "parent_id": "b1",
        "payload": {"question": "Q?", "kind": "short_answer", "answer": "A"},
    });

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["apply", "--request", "-", "--notebook"])
        .arg(&notebook)
        .arg("--out")
        .arg(&out)
        .write_stdin(serde_json::to_string(&request)?)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"created_id\":\"b1.example-"));

    assert_eq!(std::fs::read_to_string(&notebook)?, before);
    let edited = store::load(&out)?;
    let block = &edited.sections.get("S1").expect("S1").concept_blocks[0];
    assert_eq!(block.examples.len(), 3);
    Ok(())
}

#[test]
fn apply_rejects_bad_requests() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notebook = write_fixture(dir.path(), "calculus.yaml")?;
    let before = std::fs::read_to_string(&notebook)?;

    let request = write_request(
        dir.path(),
        serde_json::json!({
            "action": "create",
            "kind": "example",
            "parent_id": "b1",
            "payload": {"question": "Q?", "kind": "short_answer", "answer": "A"},
            "position": "after",
            "target_index": 7,
        }),
    )?;
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["apply", "--notebook"])
        .arg(&notebook)
        .arg("--request")
        .arg(&request)
        .assert()
        .failure()
        .stderr(predicate::str::contains("index 7 is out of range for examples"));

    let request = write_request(
        dir.path(),
        serde_json::json!({"action": "delete", "id": "e1"}),
    )?;
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["apply", "--expect-fingerprint", "deadbeef", "--notebook"])
        .arg(&notebook)
        .arg("--request")
        .arg(&request)
        .assert()
        .failure()
        .stderr(predicate::str::contains("notebook changed"));

    assert_eq!(std::fs::read_to_string(&notebook)?, before);
    Ok(())
}

#[test]
fn check_reports_outline_drift() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("drift.yaml");
    let mut notebook = fixtures::calculus();
    notebook.outline.sections.remove("S2");
    store::save(&path, &notebook)?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.args(["check", "--notebook"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("section `S2`: missing from outline"))
        .stderr(predicate::str::contains("1 issue(s) found"));
    Ok(())
}

#[test]
fn notebookify_log_debug_emits_debug_line_to_stderr() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notebook = write_fixture(dir.path(), "calculus.yaml")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("notebookify");
    cmd.env("NOTEBOOKIFY_LOG", "debug")
        .args(["render", "--notebook"])
        .arg(&notebook)
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
    Ok(())
}
