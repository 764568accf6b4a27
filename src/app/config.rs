//! Validated configuration shared by both tools.
//!
//! The subscription id has no default and must be supplied on every run, either with
//! `--subscription` or through `AZURE_SUBSCRIPTION_ID`.

use super::credentials::CredentialOptions;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("subscription id '{0}' is not a GUID")]
    InvalidSubscription(String),
    #[error("invalid {name} '{value}': {reason}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Canonical lowercase hyphenated GUID
    pub subscription_id: String,
    pub management_endpoint: Url,
    pub authority_host: Url,
}

impl ToolConfig {
    pub fn new(
        subscription_id: &str,
        management_endpoint: &str,
        authority_host: &str,
    ) -> Result<Self, ConfigError> {
        let subscription = Uuid::parse_str(subscription_id.trim())
            .map_err(|_| ConfigError::InvalidSubscription(subscription_id.to_string()))?;

        Ok(Self {
            subscription_id: subscription.to_string(),
            management_endpoint: parse_http_url("management endpoint", management_endpoint)?,
            authority_host: parse_http_url("authority host", authority_host)?,
        })
    }

    pub fn credential_options(&self) -> CredentialOptions {
        CredentialOptions {
            authority_host: self.authority_host.as_str().trim_end_matches('/').to_string(),
            resource: self
                .management_endpoint
                .as_str()
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

fn parse_http_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(value.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
