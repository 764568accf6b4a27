//! azmon-toggle - bulk enable/disable for Azure Monitor metric alerts and availability tests
//!
//! Two command-line tools share this library:
//!
//! - `manage-alerts` toggles `Microsoft.Insights/metricAlerts`
//! - `manage-availability-tests` toggles `Microsoft.Insights/webtests`
//!
//! Both are invoked as `<tool> <enable|disable> <wildcard_file> <resource_group>` and run the
//! same linear pipeline: load the wildcard file, authenticate, list every resource of the kind in
//! the resource group, match names against the wildcards, and flip the `enabled` flag of each
//! match with a get-then-update pair. A write is only issued when the current state differs
//! from the requested one, so reruns are safe.
//!
//! # Architecture Overview
//!
//! - **Wildcards** ([`app::wildcards`]): pattern file loading and case-insensitive glob matching
//! - **Resource client** ([`app::arm_client`]): the [`app::arm_client::ResourceClient`] seam and
//!   its ARM REST implementation
//! - **Credentials** ([`app::credentials`]): bearer token chain (service principal, managed
//!   identity, Azure CLI)
//! - **Toggle controller** ([`app::toggle`]): per-resource get/compare/update returning a
//!   [`app::toggle::ToggleOutcome`]
//! - **Batch driver** ([`app::batch`]): listing, matching, reporting and exit-code derivation
//! - **CLI** ([`app::cli`]): argument parsing and wiring shared by both binaries

#![warn(clippy::all, rust_2018_idioms)]

// Include logging macros first
#[macro_use]
pub mod logging_macros;

pub mod app;
