#![cfg(feature = "cli_api")]

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use tempfile::NamedTempFile;

#[allow(deprecated)]
fn run_cli(script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.write_stdin(script.to_string()).assert()
}

#[test]
fn cli_validates_patterns() {
    run_cli("validate monthly:1:15\nvalidate weekly:1:9\nquit\n")
        .success()
        .stdout(str_contains("Valid pattern: every 1 month(s) on day 15"))
        .stdout(str_contains("Invalid pattern: weekdays out of range: 9"));
}

#[test]
fn cli_computes_next_occurrence_for_pattern_and_task() {
    run_cli(
        "next weekly:1:1,3 2025-01-16\nadd Payroll 4 Payroll monthly:1:15\nnext 1 2025-01-20\nquit\n",
    )
    .success()
    .stdout(str_contains("Next occurrence after 2025-01-16: 2025-01-20"))
    .stdout(str_contains("Recurring task Payroll added"))
    .stdout(str_contains("Next occurrence after 2025-01-20: 2025-02-15"));
}

#[test]
fn cli_rejects_invalid_task_pattern() {
    run_cli("add Payroll 4 Payroll monthly:1\nlist\nquit\n")
        .success()
        .stdout(str_contains("Invalid pattern: Monthly pattern requires dayOfMonth"));
}

#[test]
fn cli_reports_demand_per_skill() {
    run_cli("add VAT 10 A,B monthly:1:15\ndemand 2025-01-01 2025-01-31\nmatrix 2025-01-01 2025-02-28\nquit\n")
        .success()
        .stdout(str_contains("Total hours: 20.00"))
        .stdout(str_contains("| skill |"))
        .stdout(str_contains("2025-02"));
}

#[test]
fn cli_generates_instances_and_lists_them() {
    run_cli("add Payroll 4 Payroll monthly:1:15\ngenerate 2025-01-01 2025-01-31 14\ninstances\nlist\nquit\n")
        .success()
        .stdout(str_contains("Generated (generated=1, skipped=0)"))
        .stdout(str_contains("2025-01-15"))
        .stdout(str_contains("recurring"));
}

#[test]
fn cli_rejects_inverted_generation_range() {
    run_cli("generate 2025-02-01 2025-01-01\nquit\n")
        .success()
        .stdout(str_contains("Generation error: from date 2025-02-01 must be on or before to date 2025-01-01"));
}

#[test]
fn cli_copies_tasks_to_another_client() {
    run_cli(
        "add Payroll 4 Payroll monthly:1:15\nadhoc Advice 2 2025-03-01\ncopy 7c9e6679-7425-40de-944b-e07fc1f90ae7 1,9 1\nquit\n",
    )
    .success()
    .stdout(str_contains("Copied (recurring=1, ad_hoc=1, errors=1)"));
}

#[test]
fn cli_deactivates_tasks() {
    run_cli("add Payroll 4 Payroll monthly:1:15\ndeactivate 1\ndeactivate 5\nquit\n")
        .success()
        .stdout(str_contains("Deactivated task"))
        .stdout(str_contains("Task 5 not found."));
}

#[test]
fn cli_save_and_load_json_round_trip() {
    let tmp = NamedTempFile::new().expect("create temp file");
    let path = tmp.path().to_string_lossy().to_string();
    let script = format!(
        "add KeepMe 4 Payroll monthly:1:15\nsave json {path}\nadd Temp 1 Payroll daily:1\nload json {path}\nlist\nquit\n"
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Store saved to"));
    assert!(output.contains("Store loaded from"));
    let after_reload = output
        .split("Store loaded from")
        .last()
        .unwrap_or_default();
    assert!(after_reload.contains("KeepMe"), "persisted task missing:\n{after_reload}");
    assert!(
        !after_reload.contains("Temp"),
        "temporary task should not appear after reload:\n{after_reload}"
    );
}

#[test]
fn cli_save_and_load_csv_round_trip() {
    let tmp = NamedTempFile::new().expect("create temp file");
    let path = tmp.path().to_string_lossy().to_string();
    let script = format!(
        "add Quarterly 3 VAT quarterly:7\nsave csv {path}\nload csv {path}\nshow 1\nquit\n"
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Store loaded from"))
        .stdout(str_contains("\"recurrencePattern\""));
}

#[test]
fn cli_reports_unknown_commands() {
    run_cli("frobnicate\nquit\n")
        .success()
        .stdout(str_contains("Unknown command. Type 'help'."));
}
