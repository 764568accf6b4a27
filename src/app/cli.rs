//! Command-line surface shared by `manage-alerts` and `manage-availability-tests`.
//!
//! ```text
//! <tool> <enable|disable> <wildcard_file> <resource_group> --subscription <GUID>
//! ```
//!
//! Exit codes:
//!
//! | code | meaning                                                       |
//! |------|---------------------------------------------------------------|
//! | 0    | every matched resource is in the requested state              |
//! | 1    | at least one matched resource failed                          |
//! | 2    | input error: bad arguments, configuration or wildcard file    |
//! | 3    | discovery error: listing or authentication failed             |

use super::action::ToggleAction;
use super::arm_client::{ArmResourceClient, ResourceClient};
use super::batch::{self, BatchError};
use super::config::{ToolConfig, DEFAULT_AUTHORITY_HOST, DEFAULT_MANAGEMENT_ENDPOINT};
use super::credentials;
use super::logging::init_logging;
use super::resource::ResourceKind;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Parser)]
pub struct ToolArgs {
    /// Action to perform
    #[arg(value_enum)]
    pub action: ToggleAction,

    /// File containing wildcard patterns (one per line) to match resource names
    pub wildcard_file: PathBuf,

    /// The resource group to search
    pub resource_group: String,

    /// Azure subscription id (GUID)
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription: String,

    /// Azure Resource Manager endpoint
    #[arg(long, env = "AZURE_RESOURCE_MANAGER_ENDPOINT", default_value = DEFAULT_MANAGEMENT_ENDPOINT)]
    pub management_endpoint: String,

    /// Entra ID authority used for service principal logins
    #[arg(long, env = "AZURE_AUTHORITY_HOST", default_value = DEFAULT_AUTHORITY_HOST)]
    pub authority_host: String,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    ResourceFailures = 1,
    InputError = 2,
    DiscoveryError = 3,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

fn command(kind: ResourceKind) -> clap::Command {
    let (name, about) = match kind {
        ResourceKind::MetricAlert => (
            "manage-alerts",
            "Enable or disable metric alerts based on wildcards.",
        ),
        ResourceKind::AvailabilityTest => (
            "manage-availability-tests",
            "Enable or disable availability tests based on wildcards.",
        ),
    };
    ToolArgs::command()
        .name(name)
        .bin_name(name)
        .about(about)
        .version(concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT"), ")"))
}

/// Parse arguments for the tool handling `kind`
pub fn parse_args<I, T>(kind: ResourceKind, args: I) -> Result<ToolArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command(kind).try_get_matches_from(args)?;
    ToolArgs::from_arg_matches(&matches)
}

/// Process entry point used by both binaries
pub async fn main(kind: ResourceKind) -> ExitCode {
    let args = match parse_args(kind, std::env::args_os()) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };
    init_logging(args.verbose);

    let mut stdout = std::io::stdout().lock();
    run_tool(kind, &args, &mut stdout).await.into()
}

/// Validate configuration, build the ARM client and run the batch
pub async fn run_tool(kind: ResourceKind, args: &ToolArgs, out: &mut dyn Write) -> ExitStatus {
    let config = match ToolConfig::new(
        &args.subscription,
        &args.management_endpoint,
        &args.authority_host,
    ) {
        Ok(config) => config,
        Err(e) => {
            log_error!("Invalid configuration: {}", e);
            let _ = writeln!(out, "Error: {}", e);
            return ExitStatus::InputError;
        }
    };

    let token = credentials::from_environment(&config.credential_options());
    let client = match ArmResourceClient::new(
        kind,
        config.subscription_id.clone(),
        config.management_endpoint.clone(),
        token,
    ) {
        Ok(client) => client,
        Err(e) => {
            log_error!("Failed to create ARM client: {:#}", e);
            let _ = writeln!(out, "Error: {:#}", e);
            return ExitStatus::InputError;
        }
    };

    run_with_client(&client, args, out).await
}

/// Run the batch against any resource client and map the result to an exit status
pub async fn run_with_client(
    client: &dyn ResourceClient,
    args: &ToolArgs,
    out: &mut dyn Write,
) -> ExitStatus {
    let result = batch::run(
        client,
        args.action,
        &args.wildcard_file,
        &args.resource_group,
        out,
    )
    .await;

    match result {
        Ok(report) if report.is_success() => ExitStatus::Success,
        Ok(_) => ExitStatus::ResourceFailures,
        Err(e) => {
            let _ = writeln!(out, "{}", e);
            match e {
                BatchError::Input(_) => ExitStatus::InputError,
                BatchError::Discovery { .. } => ExitStatus::DiscoveryError,
            }
        }
    }
}
