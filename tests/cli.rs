use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

fn layerfix(args: &[&str], root: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_layerfix"))
        .args(args)
        .arg(root)
        .output()
        .expect("run layerfix")
}

fn seed_project(root: &Path) {
    fs::write(root.join("project.fraytools"), "{}").expect("marker");
    fs::write(root.join("a.hx"), "spawn({layer: \"front\"});").expect("script");
}

#[test]
fn fix_json_stdout_is_a_single_object() {
    let temp = tempdir().expect("temp dir");
    seed_project(temp.path());

    let output = layerfix(&["fix", "--json", "--no-backup"], temp.path());
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is json");
    assert_eq!(report["fixed"], 1);
    assert_eq!(report["counts"]["front"], 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("found 1 cases of layer: \"front\" in a.hx"));
    assert_eq!(
        fs::read_to_string(temp.path().join("a.hx")).expect("read"),
        "spawn({layer: VfxLayer.CHARACTERS_FRONT});"
    );
}

#[test]
fn dry_run_json_has_no_preview_on_stdout() {
    let temp = tempdir().expect("temp dir");
    seed_project(temp.path());

    let output = layerfix(&["fix", "--json", "--dry-run"], temp.path());
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is json");
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["fixed"], 1);
    assert_eq!(
        fs::read_to_string(temp.path().join("a.hx")).expect("read"),
        "spawn({layer: \"front\"});"
    );
}

#[test]
fn scan_json_stdout_is_a_single_object() {
    let temp = tempdir().expect("temp dir");
    seed_project(temp.path());
    fs::write(temp.path().join("b.hx"), "layer: someVariable").expect("script");

    let output = layerfix(&["scan", "--json"], temp.path());
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is json");
    assert_eq!(report["fixable"]["front"], 1);
    assert_eq!(report["unresolved"][0]["location"], "b.hx line 1");
}
