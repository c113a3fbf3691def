use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};
use tempfile::TempDir;

fn yang_resolve(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_yang-resolve"))
        .args(args)
        .output()
        .expect("failed to run yang-resolve")
}

fn stmt(keyword: &str, argument: &str, children: Vec<Value>) -> Value {
    json!({ "keyword": keyword, "argument": argument, "children": children })
}

fn leaf(keyword: &str, argument: &str) -> Value {
    stmt(keyword, argument, Vec::new())
}

fn write_unit(dir: &Path, file: &str, root: Value) -> PathBuf {
    let unit = json!({ "source": file, "conformance": "IMPLEMENT", "root": root });
    let path = dir.join(file);
    fs::write(&path, serde_json::to_string_pretty(&unit).unwrap()).expect("failed to write unit");
    path
}

/// Two modules: one declaring an identity hierarchy, one using a grouping once.
fn write_fixture(dir: &Path) -> (PathBuf, PathBuf) {
    let types = write_unit(
        dir,
        "acme-types.json",
        stmt(
            "module",
            "acme-types",
            vec![
                leaf("namespace", "urn:acme:types"),
                leaf("prefix", "at"),
                leaf("identity", "crypto-alg"),
                stmt("identity", "aes", vec![leaf("base", "crypto-alg")]),
                stmt("identity", "aes-256", vec![leaf("base", "aes")]),
            ],
        ),
    );
    let acme = write_unit(
        dir,
        "acme.json",
        stmt(
            "module",
            "acme",
            vec![
                leaf("namespace", "urn:acme"),
                leaf("prefix", "ac"),
                stmt("import", "acme-types", vec![leaf("prefix", "at")]),
                stmt(
                    "grouping",
                    "endpoint",
                    vec![stmt("leaf", "address", vec![leaf("type", "string")])],
                ),
                stmt("container", "server", vec![leaf("uses", "endpoint")]),
            ],
        ),
    );
    (types, acme)
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp path is utf-8")
}

#[test]
fn resolve_prints_json_report() {
    let dir = TempDir::new().unwrap();
    let (types, acme) = write_fixture(dir.path());

    let output = yang_resolve(&["resolve", "--format", "json", path_str(&types), path_str(&acme)]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(report["units"].as_array().unwrap().len(), 2);
    assert_eq!(report["identities"], 3);
    let codes: Vec<&str> = report["findings"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["finding_type"].as_str())
        .collect();
    assert!(codes.contains(&"P133_GROUPING_USED_ONCE_ONLY"));
}

#[test]
fn resolve_accepts_directories() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let output = yang_resolve(&["resolve", "--format", "yaml", path_str(dir.path())]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: acme-types"));
    assert!(stdout.contains("name: acme\n"));
}

#[test]
fn resolve_fails_on_configured_finding_type() {
    let dir = TempDir::new().unwrap();
    let (types, acme) = write_fixture(dir.path());

    let output = yang_resolve(&[
        "resolve",
        "--fail-on",
        "P132_GROUPING_NOT_USED,P133_GROUPING_USED_ONCE_ONLY",
        path_str(&types),
        path_str(&acme),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: findings of failing type(s) reported: P133_GROUPING_USED_ONCE_ONLY"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("P133_GROUPING_USED_ONCE_ONLY"));
}

#[test]
fn suppressed_finding_types_do_not_fail() {
    let dir = TempDir::new().unwrap();
    let (types, acme) = write_fixture(dir.path());
    let config = dir.path().join("config.yaml");
    fs::write(&config, "suppressed_finding_types:\n  - P133_GROUPING_USED_ONCE_ONLY\n").unwrap();

    let output = yang_resolve(&[
        "resolve",
        "--config",
        path_str(&config),
        "--fail-on",
        "P133_GROUPING_USED_ONCE_ONLY",
        path_str(&types),
        path_str(&acme),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn unknown_fail_on_code_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (types, _) = write_fixture(dir.path());
    let output = yang_resolve(&["resolve", "--fail-on", "P999_NOPE", path_str(&types)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown finding type 'P999_NOPE'"));
}

#[test]
fn missing_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    let output = yang_resolve(&["resolve", path_str(&missing)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn malformed_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    let output = yang_resolve(&["resolve", path_str(&path)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load"));
}

#[test]
fn identities_prints_derived_closure() {
    let dir = TempDir::new().unwrap();
    let (types, acme) = write_fixture(dir.path());

    let output = yang_resolve(&[
        "identities",
        "--identity",
        "acme-types:aes",
        "--format",
        "json",
        path_str(&types),
        path_str(&acme),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let closure: Value = serde_json::from_slice(&output.stdout).unwrap();
    let mut names: Vec<&str> = closure
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|id| id["name"].as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["aes", "aes-256"]);
}

#[test]
fn identities_rejects_unknown_identity() {
    let dir = TempDir::new().unwrap();
    let (types, _) = write_fixture(dir.path());
    let output = yang_resolve(&["identities", "--identity", "acme-types:des", path_str(&types)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("is not declared by any input"));
}

#[test]
fn init_config_writes_loadable_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("resolver.yaml");

    let output = yang_resolve(&["init-config", path_str(&path)]);
    assert!(output.status.success());
    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("merge_submodules: true"));
    assert!(raw.contains("fail_fast: true"));

    let again = yang_resolve(&["init-config", path_str(&path)]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("--force"));

    let forced = yang_resolve(&["init-config", "--force", path_str(&path)]);
    assert!(forced.status.success());
}
