#![warn(clippy::all, rust_2018_idioms)]

//! Bulk enable or disable Azure Monitor metric alerts matching a wildcard file.

use azmon_toggle::app::{cli, resource::ResourceKind};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    cli::main(ResourceKind::MetricAlert).await
}
