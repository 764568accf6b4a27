//! Core modules for the alert and availability-test toggling tools.
//!
//! # Module Organization
//!
//! ## Domain
//! - [`action`] - enable/disable requests
//! - [`resource`] - resource kinds and the ARM document snapshot
//! - [`wildcards`] - pattern file loading and matching
//!
//! ## Azure Integration
//! - [`credentials`] - bearer token providers
//! - [`arm_client`] - the resource client seam and its ARM REST implementation
//! - [`arm_errors`] - ARM error categorization for user-facing reports
//!
//! ## Execution
//! - [`toggle`] - per-resource conditional state toggle
//! - [`batch`] - list, match, toggle, report
//! - [`config`] - validated tool configuration
//! - [`cli`] - argument parsing and process exit codes
//! - [`logging`] - tracing subscriber setup

pub mod action;
pub mod arm_client;
pub mod arm_errors;
pub mod batch;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod logging;
pub mod resource;
pub mod toggle;
pub mod wildcards;
