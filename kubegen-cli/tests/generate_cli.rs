use std::fs;
use assert_cmd::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const PODS: &str = r#"[
  {"metadata": {"name": "web-1", "labels": {"app": "web"}},
   "status": {"podIP": "10.1.0.4", "conditions": [{"type": "Ready", "status": "True"}]}},
  {"metadata": {"name": "web-2", "labels": {"app": "web"}},
   "status": {"podIP": "10.1.0.5", "conditions": [{"type": "Ready", "status": "False"}]}}
]"#;

const SERVICES_YAML: &str = "items:\n  - metadata:\n      name: web\n      namespace: default\n";

fn state_dir() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("pods.json"), PODS).expect("pods");
    fs::write(dir.path().join("services.yaml"), SERVICES_YAML).expect("services");
    dir
}

fn kube_gen(state: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("kube-gen"));
    cmd.arg("--source-dir").arg(state.path());
    cmd
}

#[test]
fn renders_to_stdout_without_output_path() {
    let state = state_dir();
    let template = state.path().join("upstream.tmpl");
    fs::write(
        &template,
        "{% for p in pods | ready_only %}server {{ p.status.podIP }};\n{% endfor %}",
    )
    .expect("template");

    kube_gen(&state)
        .arg(&template)
        .assert()
        .success()
        .stdout("server 10.1.0.4;\n");
}

#[test]
fn reads_template_from_stdin_and_writes_file() {
    let state = state_dir();
    let out = state.path().join("out").join("summary.txt");

    kube_gen(&state)
        .args(["--type", "services", "-"])
        .arg(&out)
        .write_stdin("\n{{ services | length }}/{{ pods | length }}\n")
        .assert()
        .success()
        .stdout("");
    assert_eq!(fs::read_to_string(&out).expect("out"), "1/0");
}

#[test]
fn hooks_run_around_the_write() {
    let state = state_dir();
    let template = state.path().join("t.tmpl");
    fs::write(&template, "x").expect("template");
    let out = state.path().join("out.txt");
    let log = state.path().join("hooks.log");

    kube_gen(&state)
        .arg("--pre-cmd")
        .arg(format!("echo pre >> {}", log.display()))
        .arg("--post-cmd")
        .arg(format!("cat {} >> {}", out.display(), log.display()))
        .arg(&template)
        .arg(&out)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&log).expect("log"), "pre\nx");
}

#[test]
fn failing_pre_command_fails_the_run() {
    let state = state_dir();
    let template = state.path().join("t.tmpl");
    fs::write(&template, "x").expect("template");
    let out = state.path().join("out.txt");

    kube_gen(&state)
        .args(["--pre-cmd", "exit 7"])
        .arg(&template)
        .arg(&out)
        .assert()
        .failure()
        .stderr(contains("exited with status 7"));
    assert!(!out.exists());
}

#[test]
fn overwrite_false_refuses_existing_output() {
    let state = state_dir();
    let template = state.path().join("t.tmpl");
    fs::write(&template, "new").expect("template");
    let out = state.path().join("out.txt");
    fs::write(&out, "old").expect("seed");

    kube_gen(&state)
        .args(["--overwrite", "false"])
        .arg(&template)
        .arg(&out)
        .assert()
        .failure()
        .stderr(contains("output file already exists"));
    assert_eq!(fs::read_to_string(&out).expect("out"), "old");
}

#[test]
fn invalid_wait_is_rejected_up_front() {
    let state = state_dir();
    kube_gen(&state)
        .args(["--wait", ":5s", "t.tmpl"])
        .assert()
        .failure()
        .stderr(contains("minimum is required"));
}

#[test]
fn template_errors_are_reported() {
    let state = state_dir();
    let template = state.path().join("bad.tmpl");
    fs::write(&template, "{{ pods | group_by(path=\"metadata.labels\") }}").expect("template");

    kube_gen(&state)
        .arg(&template)
        .assert()
        .failure()
        .stderr(contains("error rendering template"));
}

#[test]
fn quiet_suppresses_logging() {
    let state = state_dir();
    let template = state.path().join("t.tmpl");
    fs::write(&template, "{{ pods | length }}").expect("template");

    kube_gen(&state)
        .arg("--quiet")
        .arg(&template)
        .assert()
        .success()
        .stdout("2")
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_flag_prints_the_binary_name() {
    Command::new(assert_cmd::cargo::cargo_bin!("kube-gen"))
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("kube-gen"));
}
