//! Bearer token acquisition for Azure Resource Manager.
//!
//! The tools need a token for the management endpoint and nothing else. The environment
//! decides which providers take part, and they are tried in this order:
//!
//! 1. service principal, when `AZURE_TENANT_ID` + `AZURE_CLIENT_ID` + `AZURE_CLIENT_SECRET`
//!    are all set
//! 2. managed identity, whose source is
//!    - `IDENTITY_ENDPOINT` + `IDENTITY_HEADER` → App Service / Functions
//!    - `IDENTITY_ENDPOINT` alone → Azure Arc (challenge with a local key file)
//!    - otherwise → instance metadata service (IMDS) on VMs and scale sets
//! 3. Azure CLI (`az account get-access-token`)
//!
//! A provider that cannot run here (no endpoint, no identity assigned, no `az`) hands over to
//! the next one. Any other failure ends the chain. The first provider that returns a token is
//! used for the rest of the run.
//!
//! Tokens are cached in-process until five minutes before expiry. Nothing is persisted.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Mutex;

const IMDS_AUTHORITY: &str = "http://169.254.169.254";
const IMDS_TOKEN_PATH: &str = "/metadata/identity/oauth2/token";
/// First IMDS request only; a VM answers well within this
const IMDS_FIRST_CONTACT_TIMEOUT: Duration = Duration::from_secs(3);
const ARC_KEY_MAX_BYTES: u64 = 4096;
const EXPIRY_BUFFER: Duration = Duration::from_secs(300);
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{provider} token request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} token request rejected (HTTP {status}): {message}")]
    Rejected {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider} token response has no {field}")]
    MissingToken {
        provider: &'static str,
        field: &'static str,
    },
    #[error("{provider} is not available: {message}")]
    Unavailable {
        provider: &'static str,
        message: String,
    },
    #[error("Azure CLI not found ({0}). Install the Azure CLI or configure service principal credentials.")]
    CliUnavailable(String),
    #[error("az account get-access-token failed: {0}. Run 'az login' first.")]
    CliFailed(String),
    #[error("{provider} returned unreadable output: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
    #[error("no credential could provide a token ({0})")]
    Exhausted(String),
}

impl CredentialError {
    /// The provider cannot run in this environment and the next one may be tried
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CredentialError::Request { .. }
                | CredentialError::Unavailable { .. }
                | CredentialError::CliUnavailable(_)
                | CredentialError::CliFailed(_)
                | CredentialError::Exhausted(_)
        )
    }
}

/// Abstraction over token acquisition, enables test injection
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn token(&self) -> Result<String, CredentialError>;
}

/// Endpoints the providers talk to
#[derive(Debug, Clone)]
pub struct CredentialOptions {
    /// Entra ID authority, e.g. `https://login.microsoftonline.com`
    pub authority_host: String,
    /// ARM endpoint the token is issued for, e.g. `https://management.azure.com`
    pub resource: String,
}

impl CredentialOptions {
    fn scope(&self) -> String {
        format!("{}/.default", self.resource.trim_end_matches('/'))
    }

    fn resource_uri(&self) -> String {
        format!("{}/", self.resource.trim_end_matches('/'))
    }
}

/// Build the provider chain from the process environment
pub fn from_environment(options: &CredentialOptions) -> Box<dyn TokenProvider> {
    select_provider(|key| std::env::var(key).ok(), options)
}

/// Build the provider chain from an arbitrary variable lookup
pub fn select_provider<F>(lookup: F, options: &CredentialOptions) -> Box<dyn TokenProvider>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let http = reqwest::Client::new();
    let mut providers: Vec<Box<dyn TokenProvider>> = Vec::new();

    if let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
        var("AZURE_TENANT_ID"),
        var("AZURE_CLIENT_ID"),
        var("AZURE_CLIENT_SECRET"),
    ) {
        log_debug!("Service principal credentials configured for client {}", client_id);
        providers.push(Box::new(ServicePrincipalCredential {
            tenant_id,
            client_id,
            client_secret,
            options: options.clone(),
            http: http.clone(),
            cache: TokenCache::default(),
        }));
    }

    providers.push(Box::new(ManagedIdentityCredential::from_lookup(
        &var,
        options,
        http,
    )));

    providers.push(Box::new(AzureCliCredential {
        tenant_id: var("AZURE_TENANT_ID"),
        options: options.clone(),
        cache: TokenCache::default(),
    }));

    Box::new(ChainedCredential::new(providers))
}

// ── Chain ────────────────────────────────────────────────────────────────────

/// Tries providers in order until one returns a token, then sticks with it
pub struct ChainedCredential {
    providers: Vec<Box<dyn TokenProvider>>,
    selected: OnceLock<usize>,
}

impl ChainedCredential {
    pub fn new(providers: Vec<Box<dyn TokenProvider>>) -> Self {
        Self {
            providers,
            selected: OnceLock::new(),
        }
    }
}

#[async_trait]
impl TokenProvider for ChainedCredential {
    /// The provider in use, or the first one to be tried before any token was fetched
    fn name(&self) -> &'static str {
        let index = self.selected.get().copied().unwrap_or(0);
        self.providers
            .get(index)
            .map(|provider| provider.name())
            .unwrap_or("credential chain")
    }

    async fn token(&self) -> Result<String, CredentialError> {
        if let Some(provider) = self.selected.get().and_then(|&i| self.providers.get(i)) {
            return provider.token().await;
        }

        let mut attempts = Vec::new();
        for (index, provider) in self.providers.iter().enumerate() {
            match provider.token().await {
                Ok(token) => {
                    log_debug!("Authenticated with {} credentials", provider.name());
                    let _ = self.selected.set(index);
                    return Ok(token);
                }
                Err(e) if e.is_unavailable() => {
                    log_debug!("Skipping {} credentials: {}", provider.name(), e);
                    attempts.push(format!("{}: {}", provider.name(), e));
                }
                Err(e) => return Err(e),
            }
        }

        Err(CredentialError::Exhausted(attempts.join("; ")))
    }
}

// ── Cache ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TokenCache {
    slot: Mutex<Option<(String, Instant)>>,
}

impl TokenCache {
    async fn get(&self) -> Option<String> {
        let guard = self.slot.lock().await;
        match guard.as_ref() {
            Some((token, expiry)) if Instant::now() < *expiry => Some(token.clone()),
            _ => None,
        }
    }

    async fn store(&self, token: &str, lifetime: Duration) {
        let expiry = Instant::now() + lifetime.saturating_sub(EXPIRY_BUFFER);
        *self.slot.lock().await = Some((token.to_string(), expiry));
    }
}

/// Read a lifetime that may be given as a number or a numeric string
fn seconds_field(body: &Value, field: &str) -> Option<u64> {
    match body.get(field)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Lifetime from `expires_in`, or from an absolute `expires_on` epoch
fn token_lifetime(body: &Value) -> Duration {
    if let Some(secs) = seconds_field(body, "expires_in") {
        return Duration::from_secs(secs);
    }
    if let Some(epoch) = seconds_field(body, "expires_on") {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        return Duration::from_secs(epoch.saturating_sub(now));
    }
    log_warn!("Token response carries no expiry, assuming one hour");
    DEFAULT_LIFETIME
}

async fn read_token_response(
    provider: &'static str,
    resp: reqwest::Response,
) -> Result<(String, Duration), CredentialError> {
    let status = resp.status();
    let body: Value = resp
        .json()
        .await
        .map_err(|source| CredentialError::Request { provider, source })?;

    if !status.is_success() {
        let message = body
            .get("error_description")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(CredentialError::Rejected {
            provider,
            status: status.as_u16(),
            message,
        });
    }

    let token = body
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or(CredentialError::MissingToken {
            provider,
            field: "access_token",
        })?
        .to_string();
    Ok((token, token_lifetime(&body)))
}

// ── Service Principal ────────────────────────────────────────────────────────

pub struct ServicePrincipalCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    options: CredentialOptions,
    http: reqwest::Client,
    cache: TokenCache,
}

#[async_trait]
impl TokenProvider for ServicePrincipalCredential {
    fn name(&self) -> &'static str {
        "service principal"
    }

    async fn token(&self) -> Result<String, CredentialError> {
        if let Some(token) = self.cache.get().await {
            log_trace!("Service principal token cache hit");
            return Ok(token);
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.options.authority_host.trim_end_matches('/'),
            self.tenant_id
        );
        let scope = self.options.scope();
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];
        log_debug!("Requesting service principal token from {}", url);

        let resp = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|source| CredentialError::Request {
                provider: self.name(),
                source,
            })?;
        let (token, lifetime) = read_token_response(self.name(), resp).await?;
        self.cache.store(&token, lifetime).await;
        Ok(token)
    }
}

// ── Managed Identity ─────────────────────────────────────────────────────────

enum ManagedIdentitySource {
    AppService { endpoint: String, header: String },
    Arc { endpoint: String },
    Imds { endpoint: String },
}

pub struct ManagedIdentityCredential {
    source: ManagedIdentitySource,
    /// User-assigned identity, system-assigned when absent
    client_id: Option<String>,
    options: CredentialOptions,
    http: reqwest::Client,
    cache: TokenCache,
    /// Set once IMDS has answered, lifts the first-contact timeout
    reached: AtomicBool,
}

impl ManagedIdentityCredential {
    fn from_lookup<F>(var: &F, options: &CredentialOptions, http: reqwest::Client) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = match (var("IDENTITY_ENDPOINT"), var("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => {
                log_debug!("Managed identity source: App Service at {}", endpoint);
                ManagedIdentitySource::AppService { endpoint, header }
            }
            (Some(endpoint), None) => {
                log_debug!("Managed identity source: Azure Arc at {}", endpoint);
                ManagedIdentitySource::Arc { endpoint }
            }
            (None, _) => {
                let authority = var("AZURE_POD_IDENTITY_AUTHORITY_HOST")
                    .unwrap_or_else(|| IMDS_AUTHORITY.to_string());
                let endpoint = format!("{}{}", authority.trim_end_matches('/'), IMDS_TOKEN_PATH);
                log_debug!("Managed identity source: IMDS at {}", endpoint);
                ManagedIdentitySource::Imds { endpoint }
            }
        };

        Self {
            source,
            client_id: var("AZURE_CLIENT_ID"),
            options: options.clone(),
            http,
            cache: TokenCache::default(),
            reached: AtomicBool::new(false),
        }
    }

    fn query(&self, api_version: &'static str) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("api-version", api_version.to_string()),
            ("resource", self.options.resource_uri()),
        ];
        if let Some(client_id) = self.client_id.as_deref() {
            query.push(("client_id", client_id.to_string()));
        }
        query
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, CredentialError> {
        request.send().await.map_err(|source| CredentialError::Request {
            provider: self.name(),
            source,
        })
    }

    async fn imds_token(&self, endpoint: &str) -> Result<(String, Duration), CredentialError> {
        let mut request = self
            .http
            .get(endpoint)
            .header("Metadata", "true")
            .query(&self.query("2018-02-01"));
        if !self.reached.load(Ordering::Relaxed) {
            request = request.timeout(IMDS_FIRST_CONTACT_TIMEOUT);
        }

        let resp = self.send(request).await?;
        self.reached.store(true, Ordering::Relaxed);
        if resp.status() == reqwest::StatusCode::BAD_REQUEST {
            return Err(CredentialError::Unavailable {
                provider: self.name(),
                message: "no identity is assigned to this host".to_string(),
            });
        }
        read_token_response(self.name(), resp).await
    }

    /// Arc answers the first request with a challenge naming a local key file
    async fn arc_token(&self, endpoint: &str) -> Result<(String, Duration), CredentialError> {
        let query = self.query("2020-06-01");
        let challenge = self
            .send(self.http.get(endpoint).header("Metadata", "true").query(&query))
            .await?;
        if challenge.status() != reqwest::StatusCode::UNAUTHORIZED {
            return read_token_response(self.name(), challenge).await;
        }

        let realm = challenge
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split_once("realm="))
            .map(|(_, path)| path.trim().trim_matches('"').to_string())
            .ok_or_else(|| CredentialError::Unavailable {
                provider: self.name(),
                message: "Azure Arc challenge carries no key file".to_string(),
            })?;
        let key = read_arc_key(self.name(), Path::new(&realm))?;

        let resp = self
            .send(
                self.http
                    .get(endpoint)
                    .header("Metadata", "true")
                    .header(reqwest::header::AUTHORIZATION, format!("Basic {}", key))
                    .query(&query),
            )
            .await?;
        read_token_response(self.name(), resp).await
    }
}

fn read_arc_key(provider: &'static str, path: &Path) -> Result<String, CredentialError> {
    let decode = |message: String| CredentialError::Decode { provider, message };

    if path.extension().and_then(|e| e.to_str()) != Some("key") {
        return Err(decode(format!(
            "challenge names '{}', which is not a .key file",
            path.display()
        )));
    }
    let size = std::fs::metadata(path)
        .map_err(|e| decode(format!("cannot read key file '{}': {}", path.display(), e)))?
        .len();
    if size > ARC_KEY_MAX_BYTES {
        return Err(decode(format!(
            "key file '{}' is larger than {} bytes",
            path.display(),
            ARC_KEY_MAX_BYTES
        )));
    }

    std::fs::read_to_string(path)
        .map(|key| key.trim().to_string())
        .map_err(|e| decode(format!("cannot read key file '{}': {}", path.display(), e)))
}

#[async_trait]
impl TokenProvider for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "managed identity"
    }

    async fn token(&self) -> Result<String, CredentialError> {
        if let Some(token) = self.cache.get().await {
            log_trace!("Managed identity token cache hit");
            return Ok(token);
        }

        let (token, lifetime) = match &self.source {
            ManagedIdentitySource::AppService { endpoint, header } => {
                let resp = self
                    .send(
                        self.http
                            .get(endpoint)
                            .header("X-IDENTITY-HEADER", header)
                            .query(&self.query("2019-08-01")),
                    )
                    .await?;
                read_token_response(self.name(), resp).await?
            }
            ManagedIdentitySource::Arc { endpoint } => self.arc_token(endpoint).await?,
            ManagedIdentitySource::Imds { endpoint } => self.imds_token(endpoint).await?,
        };

        self.cache.store(&token, lifetime).await;
        Ok(token)
    }
}

// ── Azure CLI ────────────────────────────────────────────────────────────────

pub struct AzureCliCredential {
    tenant_id: Option<String>,
    options: CredentialOptions,
    cache: TokenCache,
}

impl AzureCliCredential {
    fn program() -> &'static str {
        if cfg!(windows) {
            "az.cmd"
        } else {
            "az"
        }
    }
}

#[async_trait]
impl TokenProvider for AzureCliCredential {
    fn name(&self) -> &'static str {
        "Azure CLI"
    }

    async fn token(&self) -> Result<String, CredentialError> {
        if let Some(token) = self.cache.get().await {
            log_trace!("Azure CLI token cache hit");
            return Ok(token);
        }

        let resource = self.options.resource_uri();
        let mut cmd = tokio::process::Command::new(Self::program());
        cmd.args([
            "account",
            "get-access-token",
            "--resource",
            resource.as_str(),
            "--output",
            "json",
        ]);
        if let Some(tenant) = self.tenant_id.as_deref() {
            cmd.args(["--tenant", tenant]);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| CredentialError::CliUnavailable(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::CliFailed(stderr.trim().to_string()));
        }

        let body: Value =
            serde_json::from_slice(&output.stdout).map_err(|e| CredentialError::Decode {
                provider: self.name(),
                message: e.to_string(),
            })?;
        let token = body
            .get("accessToken")
            .and_then(Value::as_str)
            .ok_or(CredentialError::MissingToken {
                provider: self.name(),
                field: "accessToken",
            })?
            .to_string();

        self.cache.store(&token, token_lifetime(&body)).await;
        Ok(token)
    }
}

// ── Static ───────────────────────────────────────────────────────────────────

/// Fixed token, for tests and for callers that obtained a token elsewhere
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    fn name(&self) -> &'static str {
        "static token"
    }

    async fn token(&self) -> Result<String, CredentialError> {
        Ok(self.0.clone())
    }
}
