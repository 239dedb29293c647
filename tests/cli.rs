// ABOUTME: Integration tests for the ecsdeploy CLI commands.
// ABOUTME: Validates --help output, argument validation, and early failures.

use assert_cmd::Command;
use predicates::prelude::*;

fn ecsdeploy_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ecsdeploy"));
    cmd.env_remove("ECSDEPLOY_ENDPOINT")
        .env_remove("ECSDEPLOY_EVENTS_ENDPOINT");
    cmd
}

#[test]
fn help_shows_commands() {
    ecsdeploy_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn update_help_lists_targets() {
    ecsdeploy_cmd()
        .args(["update", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("service"))
        .stdout(predicate::str::contains("task-definition"))
        .stdout(predicate::str::contains("scheduled-task"));
}

#[test]
fn update_service_requires_cluster_and_name() {
    ecsdeploy_cmd()
        .args(["update", "service", "--cluster", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--service-name"));
}

#[test]
fn malformed_image_is_rejected() {
    ecsdeploy_cmd()
        .args(["update", "service", "-c", "prod", "-n", "web", "-i", "a:b:c"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("image format is wrong"));
}

#[test]
fn run_task_requires_task_definition() {
    let dir = tempfile::tempdir().unwrap();

    ecsdeploy_cmd()
        .current_dir(dir.path())
        .args(["run", "task", "-c", "prod"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("task definition is required"));
}

#[test]
fn fargate_run_requires_subnets() {
    let dir = tempfile::tempdir().unwrap();

    ecsdeploy_cmd()
        .current_dir(dir.path())
        .args(["run", "task", "-c", "prod", "-d", "job", "--fargate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("requires at least one subnet"));
}

#[test]
fn json_errors_are_structured() {
    let dir = tempfile::tempdir().unwrap();

    ecsdeploy_cmd()
        .current_dir(dir.path())
        .args(["--json", "run", "task", "-c", "prod"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(r#""event":"error""#));
}

#[test]
fn invalid_config_file_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ecsdeploy.yml"), "poll_interval: 0s\n").unwrap();

    ecsdeploy_cmd()
        .current_dir(dir.path())
        .args(["update", "task-definition", "-d", "web"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("poll_interval"));
}
