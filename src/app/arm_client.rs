//! Resource client seam and its Azure Resource Manager REST implementation.
//!
//! The toggle controller and batch driver only see [`ResourceClient`]. The production
//! implementation, [`ArmResourceClient`], speaks the ARM REST API directly:
//!
//! ```text
//! GET /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Insights/{type}?api-version=...
//! GET /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Insights/{type}/{name}?api-version=...
//! PUT /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Insights/{type}/{name}?api-version=...
//! ```
//!
//! Listing follows `nextLink` until the collection is exhausted. Links that leave the
//! management endpoint, or a listing longer than the page cap, fail the whole listing.

use super::arm_errors::{parse_retry_after, ArmError};
use super::credentials::TokenProvider;
use super::resource::{MonitoredResource, ResourceKind, INSIGHTS_PROVIDER};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_PAGES: usize = 500;

/// Remote store of one resource kind
#[async_trait]
pub trait ResourceClient: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Every resource of the kind in the resource group
    async fn list_by_resource_group(
        &self,
        resource_group: &str,
    ) -> Result<Vec<MonitoredResource>, ArmError>;

    async fn get(&self, resource_group: &str, name: &str) -> Result<MonitoredResource, ArmError>;

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        resource: &MonitoredResource,
    ) -> Result<MonitoredResource, ArmError>;
}

pub struct ArmResourceClient {
    kind: ResourceKind,
    subscription_id: String,
    endpoint: Url,
    http: reqwest::Client,
    token: Box<dyn TokenProvider>,
}

impl ArmResourceClient {
    pub fn new(
        kind: ResourceKind,
        subscription_id: impl Into<String>,
        endpoint: Url,
        token: Box<dyn TokenProvider>,
    ) -> Result<Self> {
        if endpoint.cannot_be_a_base() {
            bail!("management endpoint '{}' is not a base URL", endpoint);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        log_debug!(
            "ARM client for {} using {} credentials at {}",
            kind,
            token.name(),
            endpoint
        );

        Ok(Self {
            kind,
            subscription_id: subscription_id.into(),
            endpoint,
            http,
            token,
        })
    }

    /// `.../providers/Microsoft.Insights/{type}[/{name}]?api-version=...`
    fn url(&self, resource_group: &str, name: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        // new() rejects cannot-be-a-base endpoints, so this always succeeds
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "subscriptions",
                self.subscription_id.as_str(),
                "resourceGroups",
                resource_group,
                "providers",
                INSIGHTS_PROVIDER,
                self.kind.arm_type(),
            ]);
            if let Some(name) = name {
                segments.push(name);
            }
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", self.kind.api_version());
        url
    }

    async fn execute(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<Value, ArmError> {
        let token = self.token.token().await?;
        let transport = |source| ArmError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = request.bearer_auth(token).send().await.map_err(transport)?;
        let status = resp.status();
        let retry_after = parse_retry_after(
            resp.headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
        );
        let text = resp.text().await.map_err(transport)?;
        log_trace!("ARM {} from {}: {}", status, url, text);

        let parsed = if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&text)
        };

        if !status.is_success() {
            let body = parsed.unwrap_or(Value::String(text));
            return Err(ArmError::from_response(status.as_u16(), &body, retry_after));
        }

        parsed.map_err(|e| ArmError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Resolve a `nextLink`; the bearer token is only ever sent to the management endpoint
    fn next_page(&self, current: &Url, link: &str) -> Result<Url, ArmError> {
        let decode = |message: String| ArmError::Decode {
            url: current.to_string(),
            message,
        };
        let next =
            Url::parse(link).map_err(|e| decode(format!("invalid nextLink '{}': {}", link, e)))?;
        if next.origin() != self.endpoint.origin() {
            return Err(decode(format!(
                "nextLink '{}' is outside the management endpoint {}",
                link,
                self.endpoint.origin().ascii_serialization()
            )));
        }
        Ok(next)
    }

    async fn arm_get(&self, url: &Url) -> Result<Value, ArmError> {
        log_debug!("Azure ARM GET {}", url);
        self.execute(self.http.get(url.clone()), url).await
    }

    async fn arm_put(&self, url: &Url, body: &Value) -> Result<Value, ArmError> {
        log_debug!("Azure ARM PUT {}", url);
        self.execute(self.http.put(url.clone()).json(body), url)
            .await
    }
}

#[async_trait]
impl ResourceClient for ArmResourceClient {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn list_by_resource_group(
        &self,
        resource_group: &str,
    ) -> Result<Vec<MonitoredResource>, ArmError> {
        let mut next = Some(self.url(resource_group, None));
        let mut resources = Vec::new();
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                log_error!(
                    "{} listing for resource group '{}' exceeded {} pages",
                    self.kind.title(),
                    resource_group,
                    MAX_PAGES
                );
                return Err(ArmError::Decode {
                    url: url.to_string(),
                    message: format!("listing did not finish within {} pages", MAX_PAGES),
                });
            }

            let page = self.arm_get(&url).await?;
            let items = page
                .get("value")
                .and_then(Value::as_array)
                .ok_or_else(|| ArmError::Decode {
                    url: url.to_string(),
                    message: "list response has no 'value' array".to_string(),
                })?;

            for item in items {
                match MonitoredResource::from_document(self.kind, item.clone()) {
                    Ok(resource) => resources.push(resource),
                    Err(e) => {
                        log_warn!("Skipping unnamed entry in {} listing: {}", self.kind, e);
                    }
                }
            }

            next = match page.get("nextLink").and_then(Value::as_str) {
                Some(link) if !link.is_empty() => Some(self.next_page(&url, link)?),
                _ => None,
            };
        }

        log_info!(
            "Listed {} {} in resource group '{}'",
            resources.len(),
            self.kind.plural(),
            resource_group
        );
        Ok(resources)
    }

    async fn get(&self, resource_group: &str, name: &str) -> Result<MonitoredResource, ArmError> {
        let url = self.url(resource_group, Some(name));
        let body = self.arm_get(&url).await?;
        Ok(MonitoredResource::from_document(self.kind, body)?)
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        resource: &MonitoredResource,
    ) -> Result<MonitoredResource, ArmError> {
        let url = self.url(resource_group, Some(name));
        let body = self.arm_put(&url, resource.document()).await?;
        if body.is_null() {
            return Ok(resource.clone());
        }
        Ok(MonitoredResource::from_document(self.kind, body)?)
    }
}
