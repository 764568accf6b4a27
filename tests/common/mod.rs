//! Shared test doubles for the integration tests.
//!
//! [`FakeResourceClient`] is an in-memory stand-in for the ARM resource client. It keeps
//! resources in listing order, counts every call, and can be told to fail individual
//! operations so that isolation and no-redundant-write properties can be asserted.

#![allow(dead_code)]

use async_trait::async_trait;
use azmon_toggle::app::arm_client::ResourceClient;
use azmon_toggle::app::arm_errors::ArmError;
use azmon_toggle::app::resource::{MonitoredResource, ResourceKind};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct FakeResourceClient {
    kind: ResourceKind,
    resources: Mutex<Vec<MonitoredResource>>,
    fail_list: Option<u16>,
    fail_get: HashSet<String>,
    fail_update: HashSet<String>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    update_calls: AtomicUsize,
    updated: Mutex<Vec<String>>,
}

impl FakeResourceClient {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            resources: Mutex::new(Vec::new()),
            fail_list: None,
            fail_get: HashSet::new(),
            fail_update: HashSet::new(),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            updated: Mutex::new(Vec::new()),
        }
    }

    /// Metric alert client seeded with `(name, enabled)` pairs
    pub fn alerts(seed: &[(&str, bool)]) -> Self {
        Self::new(ResourceKind::MetricAlert).with_resources(seed)
    }

    pub fn with_resources(self, seed: &[(&str, bool)]) -> Self {
        {
            let mut resources = self.resources.lock().unwrap();
            for (name, enabled) in seed {
                resources.push(MonitoredResource::new(self.kind, *name, *enabled));
            }
        }
        self
    }

    /// Listing answers with this HTTP status
    pub fn failing_list(mut self, status: u16) -> Self {
        self.fail_list = Some(status);
        self
    }

    /// `get` of this resource answers 404
    pub fn failing_get(mut self, name: &str) -> Self {
        self.fail_get.insert(name.to_string());
        self
    }

    /// `create_or_update` of this resource answers 409
    pub fn failing_update(mut self, name: &str) -> Self {
        self.fail_update.insert(name.to_string());
        self
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.resources
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name() == name)
            .map(MonitoredResource::is_enabled)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Total remote calls of any kind
    pub fn remote_calls(&self) -> usize {
        self.list_calls() + self.get_calls() + self.update_calls()
    }

    pub fn updated(&self) -> Vec<String> {
        self.updated.lock().unwrap().clone()
    }
}

fn api_error(status: u16, code: &str, message: String) -> ArmError {
    ArmError::from_response(
        status,
        &json!({ "error": { "code": code, "message": message } }),
        None,
    )
}

#[async_trait]
impl ResourceClient for FakeResourceClient {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn list_by_resource_group(
        &self,
        resource_group: &str,
    ) -> Result<Vec<MonitoredResource>, ArmError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_list {
            return Err(api_error(
                status,
                "ResourceGroupNotFound",
                format!("Resource group '{}' could not be found.", resource_group),
            ));
        }
        Ok(self.resources.lock().unwrap().clone())
    }

    async fn get(&self, _resource_group: &str, name: &str) -> Result<MonitoredResource, ArmError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.contains(name) {
            return Err(api_error(
                404,
                "ResourceNotFound",
                format!("The resource '{}' was not found.", name),
            ));
        }
        self.resources
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name() == name)
            .cloned()
            .ok_or_else(|| api_error(404, "ResourceNotFound", format!("'{}' not found", name)))
    }

    async fn create_or_update(
        &self,
        _resource_group: &str,
        name: &str,
        resource: &MonitoredResource,
    ) -> Result<MonitoredResource, ArmError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_update.contains(name) {
            return Err(api_error(
                409,
                "Conflict",
                "Another operation is in progress.".to_string(),
            ));
        }

        let mut resources = self.resources.lock().unwrap();
        if let Some(slot) = resources.iter_mut().find(|r| r.name() == name) {
            *slot = resource.clone();
        }
        self.updated.lock().unwrap().push(name.to_string());
        Ok(resource.clone())
    }
}
