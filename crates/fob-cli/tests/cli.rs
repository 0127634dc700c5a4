//! End-to-end tests running the `fob` binary.

mod common;

use assert_cmd::Command;
use common::Project;
use predicates::prelude::*;
use std::fs;

fn fob(project: &Project) -> Command {
    let mut cmd = Command::cargo_bin("fob").unwrap();
    cmd.current_dir(project.root())
        .arg("--no-color")
        .env("CI", "1")
        .env_remove("FOB_OUTPUT__DIR");
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("fob")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("dev"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn test_verbose_conflicts_with_quiet() {
    Command::cargo_bin("fob")
        .unwrap()
        .args(["--verbose", "--quiet", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_check_without_config() {
    let project = Project::new();
    fob(&project)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config not found"))
        .stderr(predicate::str::contains("fob.toml"));
}

#[test]
fn test_check_valid_project() {
    let project = Project::new();
    project.add_crate("engine");
    project.write_config(&["engine"]);

    fob(&project)
        .arg("check")
        .assert()
        .success()
        .stderr(predicate::str::contains("engine"))
        .stderr(predicate::str::contains("1 entry ready to build"));
}

#[test]
fn test_check_missing_manifest() {
    let project = Project::new();
    project.write_config(&["engine"]);

    fob(&project)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("manifest for entry 'engine' not found"));
}

#[test]
fn test_clean_empty_project() {
    let project = Project::new();
    project.write_config(&["engine"]);

    fob(&project)
        .arg("clean")
        .assert()
        .success()
        .stderr(predicate::str::contains("already empty"));
}

#[cfg(unix)]
#[test]
fn test_build_emits_loader_modules() {
    let project = Project::new();
    project.add_crate("engine");
    project.add_crate("physics");
    project.write_config(&["engine", "physics"]);

    fob(&project).arg("build").assert().success();

    let out = project.out_dir();
    for unit in ["engine", "physics"] {
        assert!(out.join(format!("{unit}.js")).is_file());
        assert!(out.join(format!("{unit}.wasm")).is_file());
    }
}

#[cfg(unix)]
#[test]
fn test_build_json_report() {
    let project = Project::new();
    project.add_crate("engine");
    project.write_config(&["engine"]);

    let output = fob(&project)
        .args(["build", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["units"][0]["build"]["unit_name"], "engine");
    assert_eq!(report["units"][0]["build"]["status"], "success");

    // Second build is served from the cache
    let output = fob(&project)
        .args(["build", "--json"])
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["units"][0]["build"]["status"], "cache_hit");
}

#[cfg(unix)]
#[test]
fn test_build_failure_reports_diagnostics() {
    let project = Project::new();
    project.add_crate("engine");
    let broken = project.add_crate("broken");
    fs::write(broken.join("fail.txt"), "error[E0425]: cannot find value `x`\n").unwrap();
    project.write_config(&["engine", "broken"]);

    fob(&project)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot find value"))
        .stderr(predicate::str::contains("1 of 2 units failed"));

    assert!(project.out_dir().join("engine.js").is_file());
    assert!(!project.out_dir().join("broken.js").exists());
}

#[cfg(unix)]
#[test]
fn test_build_overrides_from_flags_and_env() {
    let project = Project::new();
    project.add_crate("engine");
    project.write_config(&["engine"]);

    fob(&project)
        .args(["build", "--out-dir", "public", "--format", "cjs"])
        .assert()
        .success();
    let glue = fs::read_to_string(project.root().join("public/engine.js")).unwrap();
    assert!(glue.contains("module.exports"));

    fob(&project)
        .args(["build", "--no-cache"])
        .env("FOB_OUTPUT__DIR", "from-env")
        .assert()
        .success();
    assert!(project.root().join("from-env/engine.js").is_file());
}

#[cfg(unix)]
#[test]
fn test_clean_removes_cache_and_outputs() {
    let project = Project::new();
    project.add_crate("engine");
    project.write_config(&["engine"]);

    fob(&project).arg("build").assert().success();
    assert!(project.cache_dir().is_dir());

    fob(&project)
        .args(["clean", "--outputs"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed 1 cached artifact"));
    assert!(!project.out_dir().exists());

    fob(&project)
        .args(["build", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\""));
}
