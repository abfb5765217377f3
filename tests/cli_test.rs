// file: tests/cli_test.rs
// version: 1.0.0
// guid: 84c1f2d7-0a96-4e35-b8d2-6f97e03c51ab

//! CLI surface tests for dockervm

use assert_cmd::Command;
use predicates::prelude::*;

fn dockervm() -> Command {
    Command::cargo_bin("dockervm").expect("binary builds")
}

#[test]
fn test_help_lists_command_groups() {
    dockervm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("disk"))
        .stdout(predicate::str::contains("gpu"))
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("network"))
        .stdout(predicate::str::contains("update"));
}

#[test]
fn test_version() {
    dockervm()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_disk_help_lists_subcommands() {
    dockervm()
        .args(["disk", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mount"))
        .stdout(predicate::str::contains("docker-storage"))
        .stdout(predicate::str::contains("docker-clean-backup"))
        .stdout(predicate::str::contains("expand"))
        .stdout(predicate::str::contains("usage"));
}

#[test]
fn test_update_self_is_a_subcommand() {
    dockervm()
        .args(["update", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("self"));
}

#[test]
fn test_commands_overview_lists_everything() {
    dockervm()
        .arg("commands")
        .assert()
        .success()
        .stdout(predicate::str::contains("docker-storage"))
        .stdout(predicate::str::contains("install-driver"))
        .stdout(predicate::str::contains("dns-server"))
        .stdout(predicate::str::contains("ipvlan"))
        .stdout(predicate::str::contains("mail"));
}

#[test]
fn test_unknown_subcommand_fails() {
    dockervm()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_group_without_subcommand_fails() {
    dockervm().arg("disk").assert().failure();
}

#[test]
fn test_gpu_install_driver_accepts_url_flag() {
    dockervm()
        .args(["gpu", "install-driver", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--url"));
}
