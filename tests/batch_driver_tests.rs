//! Batch driver tests.
//!
//! End-to-end runs of list → match → toggle against the in-memory resource client, with
//! wildcard files written to a temporary directory.
//!
//! # Test Coverage
//!
//! - **Scenario**: mixed matches, only matched resources are toggled and reported
//! - **Input errors**: missing, unreadable or empty wildcard files stop the run before any
//!   remote call
//! - **Discovery errors**: a failed listing is fatal and reported once
//! - **Isolation**: a per-resource failure does not stop later resources
//! - **Exit status**: report outcomes map to the documented exit codes
//! - **Report output**: a failing writer does not stop the toggles

mod common;

use azmon_toggle::app::action::ToggleAction;
use azmon_toggle::app::batch::{self, ActionRequest, BatchError};
use azmon_toggle::app::cli::{parse_args, run_with_client, ExitStatus};
use azmon_toggle::app::resource::ResourceKind;
use azmon_toggle::app::wildcards::{WildcardError, WildcardSet};
use common::FakeResourceClient;
use pretty_assertions::assert_eq;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn wildcard_file(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("wildcards.txt");
    std::fs::write(&path, contents).unwrap();
    path
}

async fn run(
    client: &FakeResourceClient,
    action: ToggleAction,
    path: &Path,
) -> (Result<batch::BatchReport, BatchError>, String) {
    let mut out = Vec::new();
    let result = batch::run(client, action, path, "rg-prod", &mut out).await;
    (result, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn test_disable_matching_alerts_scenario() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "cpu\nmemory\n");
    let client = FakeResourceClient::alerts(&[
        ("cpu-high", true),
        ("disk-low", true),
        ("memory-low", true),
    ]);

    let (result, output) = run(&client, ToggleAction::Disable, &path).await;
    let report = result.unwrap();

    assert_eq!(client.is_enabled("cpu-high"), Some(false));
    assert_eq!(client.is_enabled("disk-low"), Some(true));
    assert_eq!(client.is_enabled("memory-low"), Some(false));
    assert_eq!(client.updated(), vec!["cpu-high", "memory-low"]);

    assert_eq!(
        output,
        "Processing metric alert: cpu-high (matched wildcard: cpu)\n\
         Metric alert 'cpu-high' has been successfully disabled.\n\
         Processing metric alert: memory-low (matched wildcard: memory)\n\
         Metric alert 'memory-low' has been successfully disabled.\n\
         Summary: 3 metric alerts listed, 2 matched, 2 disabled, 0 already disabled, 0 failed\n"
    );
    assert!(!output.contains("disk-low"));

    assert_eq!(report.listed, 3);
    assert_eq!(report.matched, 2);
    assert_eq!(report.changed, 2);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_matching_is_case_insensitive_substring() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "db\n");
    let client = FakeResourceClient::alerts(&[("Prod-DB-Alert", false), ("Prod-Web-Alert", false)]);

    let (result, _) = run(&client, ToggleAction::Enable, &path).await;

    assert_eq!(result.unwrap().changed, 1);
    assert_eq!(client.is_enabled("Prod-DB-Alert"), Some(true));
    assert_eq!(client.is_enabled("Prod-Web-Alert"), Some(false));
}

#[tokio::test]
async fn test_resource_matching_several_wildcards_is_toggled_once() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "memory\nlow\n");
    let client = FakeResourceClient::alerts(&[("memory-low", true)]);

    let (result, output) = run(&client, ToggleAction::Disable, &path).await;

    assert_eq!(result.unwrap().matched, 1);
    assert_eq!(client.get_calls(), 1);
    assert!(output.contains("(matched wildcard: memory)"));
    assert!(!output.contains("(matched wildcard: low)"));
}

#[tokio::test]
async fn test_empty_wildcard_file_makes_no_remote_calls() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "\n   \n\t\n");
    let client = FakeResourceClient::new(ResourceKind::AvailabilityTest)
        .with_resources(&[("ping-home", true)]);

    let (result, output) = run(&client, ToggleAction::Disable, &path).await;

    let err = result.unwrap_err();
    assert!(matches!(err, BatchError::Input(WildcardError::Empty { .. })));
    assert!(err.to_string().starts_with("Error: No valid wildcards found in '"));
    assert_eq!(output, "");
    assert_eq!(client.remote_calls(), 0);
}

#[tokio::test]
async fn test_missing_wildcard_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.txt");
    let client = FakeResourceClient::alerts(&[("cpu-high", true)]);

    let (result, _) = run(&client, ToggleAction::Disable, &path).await;

    let err = result.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Error: Wildcard file '{}' does not exist.", path.display())
    );
    assert_eq!(client.remote_calls(), 0);
}

#[tokio::test]
async fn test_unreadable_wildcard_file_is_input_error() {
    let dir = TempDir::new().unwrap();
    let client = FakeResourceClient::alerts(&[("cpu-high", true)]);

    let mut out = Vec::new();
    let status = run_with_client(&client, &args("disable", dir.path()), &mut out).await;

    assert_eq!(status, ExitStatus::InputError);
    let output = String::from_utf8(out).unwrap();
    assert!(output.starts_with("Error reading wildcard file: "), "{}", output);
    assert_eq!(client.remote_calls(), 0);
}

#[tokio::test]
async fn test_invalid_utf8_wildcard_file_is_unreadable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wildcards.txt");
    std::fs::write(&path, [0x63, 0x70, 0x75, 0xff, 0xfe, 0x0a]).unwrap();
    let client = FakeResourceClient::alerts(&[("cpu-high", true)]);

    let (result, output) = run(&client, ToggleAction::Disable, &path).await;

    let err = result.unwrap_err();
    assert!(matches!(err, BatchError::Input(WildcardError::Unreadable { .. })));
    assert!(err.to_string().starts_with("Error reading wildcard file: "));
    assert_eq!(output, "");
    assert_eq!(client.remote_calls(), 0);
}

#[tokio::test]
async fn test_listing_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "cpu\n");
    let client = FakeResourceClient::alerts(&[("cpu-high", true)]).failing_list(404);

    let (result, output) = run(&client, ToggleAction::Disable, &path).await;

    let err = result.unwrap_err();
    assert!(matches!(err, BatchError::Discovery { .. }));
    assert_eq!(
        err.to_string(),
        "Error fetching metric alerts for resource group 'rg-prod': ResourceGroupNotFound: Resource group 'rg-prod' could not be found. (HTTP 404)"
    );
    assert_eq!(output, "");
    assert_eq!(client.list_calls(), 1);
    assert_eq!(client.get_calls(), 0);
    assert_eq!(client.update_calls(), 0);
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_later_resources() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "cpu\n");
    let client = FakeResourceClient::alerts(&[("cpu-eu", true), ("cpu-us", true)])
        .failing_get("cpu-eu");

    let (result, output) = run(&client, ToggleAction::Disable, &path).await;
    let report = result.unwrap();

    assert_eq!(client.is_enabled("cpu-us"), Some(false));
    assert_eq!(report.changed, 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].name, "cpu-eu");
    assert!(output.contains("Error processing metric alert 'cpu-eu':"));
    assert!(output.contains("Metric alert 'cpu-us' has been successfully disabled."));
    assert!(output.ends_with("2 matched, 1 disabled, 0 already disabled, 1 failed (1 not found)\n"));
}

#[tokio::test]
async fn test_already_disabled_reports_without_writes() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "cpu\n");
    let client = FakeResourceClient::alerts(&[("cpu-high", false)]);

    let (result, output) = run(&client, ToggleAction::Disable, &path).await;

    assert_eq!(result.unwrap().already_in_state, 1);
    assert!(output.contains("Metric alert 'cpu-high' is already disabled."));
    assert_eq!(client.update_calls(), 0);
}

#[tokio::test]
async fn test_execute_with_prebuilt_request() {
    let client = FakeResourceClient::alerts(&[("cpu-high", false), ("disk-low", false)]);
    let request = ActionRequest {
        action: ToggleAction::Enable,
        resource_group: "rg-prod".to_string(),
        wildcards: WildcardSet::parse("disk-*\n"),
    };

    let mut out = Vec::new();
    let report = batch::execute(&client, &request, &mut out).await.unwrap();

    assert_eq!(report.changed, 1);
    assert_eq!(client.is_enabled("disk-low"), Some(true));
    assert_eq!(client.is_enabled("cpu-high"), Some(false));
}

fn args(action: &str, path: &Path) -> azmon_toggle::app::cli::ToolArgs {
    parse_args(
        ResourceKind::MetricAlert,
        [
            "manage-alerts",
            action,
            path.to_str().unwrap(),
            "rg-prod",
            "--subscription",
            "171af07e-2ca7-472d-bc77-e33c8d720c4b",
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn test_exit_status_success() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "cpu\n");
    let client = FakeResourceClient::alerts(&[("cpu-high", true)]);

    let mut out = Vec::new();
    let status = run_with_client(&client, &args("disable", &path), &mut out).await;

    assert_eq!(status, ExitStatus::Success);
}

#[tokio::test]
async fn test_exit_status_partial_failure() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "cpu\n");
    let client = FakeResourceClient::alerts(&[("cpu-a", true), ("cpu-b", true)])
        .failing_update("cpu-b");

    let mut out = Vec::new();
    let status = run_with_client(&client, &args("disable", &path), &mut out).await;

    assert_eq!(status, ExitStatus::ResourceFailures);
    assert_eq!(client.is_enabled("cpu-a"), Some(false));
    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("Error processing metric alert 'cpu-b': Conflict:"));
    assert!(output.contains("transient failures may succeed on rerun"));
}

#[tokio::test]
async fn test_exit_status_input_and_discovery_errors() {
    let dir = TempDir::new().unwrap();
    let empty = wildcard_file(&dir, "");
    let client = FakeResourceClient::alerts(&[("cpu-high", true)]);

    let mut out = Vec::new();
    let status = run_with_client(&client, &args("disable", &empty), &mut out).await;
    assert_eq!(status, ExitStatus::InputError);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        format!("Error: No valid wildcards found in '{}'.\n", empty.display())
    );

    let path = wildcard_file(&dir, "cpu\n");
    let failing = FakeResourceClient::alerts(&[("cpu-high", true)]).failing_list(403);
    let mut out = Vec::new();
    let status = run_with_client(&failing, &args("enable", &path), &mut out).await;
    assert_eq!(status, ExitStatus::DiscoveryError);
}

/// Report sink whose every write fails, like stdout after the reader went away
struct ClosedPipe;

impl Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_report_write_failure_does_not_stop_toggles() {
    let dir = TempDir::new().unwrap();
    let path = wildcard_file(&dir, "cpu\n");
    let client = FakeResourceClient::alerts(&[("cpu-eu", true), ("cpu-us", true)]);

    let report = batch::run(&client, ToggleAction::Disable, &path, "rg-prod", &mut ClosedPipe)
        .await
        .unwrap();

    assert_eq!(report.changed, 2);
    assert_eq!(client.updated(), vec!["cpu-eu", "cpu-us"]);
    assert_eq!(client.is_enabled("cpu-us"), Some(false));
}
