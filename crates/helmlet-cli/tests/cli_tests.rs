//! Integration tests for the helmlet binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn helmlet() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("helmlet"));
    cmd.env("NO_COLOR", "1").env_remove("HELMLET_LOG");
    cmd
}

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path.display().to_string()
}

#[test]
fn test_cli_version() {
    helmlet()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("helmlet"));
}

#[test]
fn test_no_templates_prints_usage() {
    helmlet()
        .assert()
        .success()
        .stdout(predicate::str::contains("# Helmlet version:"))
        .stdout(predicate::str::contains("Usage: helmlet --value values.yaml"));
}

#[test]
fn test_render_to_stdout_with_header() {
    let dir = TempDir::new().unwrap();
    let values = write(dir.path(), "values.yaml", "name: web\nreplicas: 2\n");
    let template = write(
        dir.path(),
        "deploy.yaml",
        "name: {{ .Values.name }}\nreplicas: {{ .Values.replicas }}\n",
    );

    helmlet()
        .args(["--value", &values, "--template", &template])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "# Processing template: {}",
            template
        )))
        .stdout(predicate::str::contains(
            "# -----------------------------------------------\nname: web\nreplicas: 2\n",
        ));
}

#[test]
fn test_layered_values_and_set_overrides() {
    let dir = TempDir::new().unwrap();
    let base = write(
        dir.path(),
        "base.yaml",
        "image:\n  repo: nginx\n  tag: '1.0'\nreplicas: 1\n",
    );
    let prod = write(dir.path(), "prod.yaml", "image:\n  tag: '2.0'\n");
    let template = write(
        dir.path(),
        "t.yaml",
        "{{ .Values.image.repo }}:{{ .Values.image.tag }} x{{ .Values.replicas }} {{ .Values.note }}\n",
    );

    helmlet()
        .args(["--value", &base, "--value", &prod, "--template", &template])
        .args(["--set", "replicas=4,note=\"a,b\""])
        .assert()
        .success()
        .stdout(predicate::str::contains("nginx:2.0 x4 a,b\n"));
}

#[test]
fn test_single_template_with_output_file() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.tpl", "value={{ .Values.v }}");
    let output = dir.path().join("out.txt");

    helmlet()
        .args(["--template", &template, "--set", "v=42"])
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Output written to"));

    assert_eq!(fs::read_to_string(&output).unwrap(), "value=42");
}

#[test]
fn test_template_dir_to_output_dir() {
    let dir = TempDir::new().unwrap();
    let templates = dir.path().join("templates");
    write(&templates, "svc.yaml", "svc: {{ .Values.name }}\n");
    write(&templates, "nested/cm.yml", "cm: {{ .Values.name | quote }}\n");
    write(&templates, "README.md", "not a template {{ broken");
    let out = dir.path().join("out");

    helmlet()
        .arg("--template-dir")
        .arg(&templates)
        .arg("--output-dir")
        .arg(&out)
        .args(["--set", "name=api"])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(out.join("svc.yaml")).unwrap(), "svc: api\n");
    assert_eq!(fs::read_to_string(out.join("cm.yml")).unwrap(), "cm: \"api\"\n");
    assert!(!out.join("README.md").exists());
}

#[test]
fn test_custom_delimiters() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.yaml", "keep {{ this }} [[ .Values.x ]]\n");

    helmlet()
        .args(["--template", &template, "--set", "x=1", "--delimiter", "[[,]]"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keep {{ this }} 1\n"));
}

#[test]
fn test_invalid_delimiter_exits_2() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.yaml", "x");

    helmlet()
        .args(["--template", &template, "--delimiter", "{{"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid delimiter pair"));
}

#[test]
fn test_missing_key_lenient_and_strict() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.yaml", "port: {{ .Values.port }}\n");

    helmlet()
        .args(["--template", &template])
        .assert()
        .success()
        .stdout(predicate::str::contains("port: <no value>\n"));

    helmlet()
        .args(["--template", &template, "--strict"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("# Error"))
        .stderr(predicate::str::contains("Missing key"))
        .stderr(predicate::str::contains("Values.port"));
}

#[test]
fn test_failed_template_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let bad = write(dir.path(), "a.yaml", "{{ if .Values.x }}never closed\n");
    let good = write(dir.path(), "b.yaml", "ok\n");

    helmlet()
        .args(["--template", &bad, "--template", &good])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ok\n"))
        .stderr(predicate::str::contains("parsing template"))
        .stderr(predicate::str::contains("missing end"));
}

#[test]
fn test_missing_values_file_exits_2() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.yaml", "x");

    helmlet()
        .args(["--value", "/no/such/values.yaml", "--template", &template])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("/no/such/values.yaml"));
}

#[test]
fn test_strict_merge_rejects_type_conflict() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.yaml", "db:\n  host: h\n");
    let b = write(dir.path(), "b.yaml", "db: sqlite\n");
    let template = write(dir.path(), "t.yaml", "{{ .Values.db }}\n");

    helmlet()
        .args(["--value", &a, "--value", &b, "--template", &template])
        .assert()
        .success()
        .stdout(predicate::str::contains("sqlite\n"));

    helmlet()
        .args(["--value", &a, "--value", &b, "--template", &template, "--strict-merge"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Type conflict"));
}

#[test]
fn test_dump_values_json() {
    let dir = TempDir::new().unwrap();
    let values = write(dir.path(), "values.yaml", "a:\n  b: 1\n");

    let output = helmlet()
        .args(["--value", &values, "--set", "a.c=x", "--dump-values", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json, serde_json::json!({"a": {"b": 1, "c": "x"}}));
}

#[test]
fn test_dump_values_yaml() {
    helmlet()
        .args(["--set", "image.tag=1.27", "--dump-values", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("image:\n  tag: '1.27'\n"));
}

#[test]
fn test_latin1_template_converted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("latin1.yaml");
    fs::write(&path, b"name: caf\xe9 cr\xe8me br\xfbl\xe9e\n").unwrap();

    helmlet()
        .arg("--template")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Converted"))
        .stdout(predicate::str::contains("name: caf\u{e9} cr\u{e8}me"));
}
