//! Resource kinds handled by the tools and the ARM document snapshot they toggle.
//!
//! The tools never create or delete resources. A [`MonitoredResource`] is the full ARM JSON
//! document as returned by a `GET`, so that writing it back with a `PUT` preserves every
//! property the tool does not understand. Only the `enabled` flag is ever modified.

use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// ARM resource provider namespace shared by both resource kinds
pub const INSIGHTS_PROVIDER: &str = "Microsoft.Insights";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Azure Monitor metric alert rule (`Microsoft.Insights/metricAlerts`)
    MetricAlert,
    /// Application Insights availability test (`Microsoft.Insights/webtests`)
    AvailabilityTest,
}

impl ResourceKind {
    /// Resource type segment under the provider namespace
    pub fn arm_type(self) -> &'static str {
        match self {
            ResourceKind::MetricAlert => "metricAlerts",
            ResourceKind::AvailabilityTest => "webtests",
        }
    }

    pub fn api_version(self) -> &'static str {
        match self {
            ResourceKind::MetricAlert => "2018-03-01",
            ResourceKind::AvailabilityTest => "2022-06-15",
        }
    }

    /// Name of the boolean flag inside `properties`.
    ///
    /// Web tests use a capitalized `Enabled` key in their ARM schema.
    pub fn enabled_property(self) -> &'static str {
        match self {
            ResourceKind::MetricAlert => "enabled",
            ResourceKind::AvailabilityTest => "Enabled",
        }
    }

    /// Lowercase singular label, e.g. "metric alert"
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::MetricAlert => "metric alert",
            ResourceKind::AvailabilityTest => "availability test",
        }
    }

    /// Sentence-start label, e.g. "Metric alert"
    pub fn title(self) -> &'static str {
        match self {
            ResourceKind::MetricAlert => "Metric alert",
            ResourceKind::AvailabilityTest => "Availability test",
        }
    }

    /// Lowercase plural label, e.g. "metric alerts"
    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::MetricAlert => "metric alerts",
            ResourceKind::AvailabilityTest => "availability tests",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", INSIGHTS_PROVIDER, self.arm_type())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("{kind} document has no name")]
    MissingName { kind: ResourceKind },
    #[error("{kind} '{name}' has a non-object 'properties' field")]
    MalformedProperties { kind: ResourceKind, name: String },
}

/// Snapshot of one remote resource
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredResource {
    kind: ResourceKind,
    name: String,
    document: Value,
}

impl MonitoredResource {
    /// Wrap an ARM document returned by a list or get call
    pub fn from_document(kind: ResourceKind, document: Value) -> Result<Self, ResourceError> {
        let name = document
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or(ResourceError::MissingName { kind })?
            .to_string();

        Ok(Self {
            kind,
            name,
            document,
        })
    }

    /// Minimal document with only a name and the enabled flag
    pub fn new(kind: ResourceKind, name: impl Into<String>, enabled: bool) -> Self {
        let name = name.into();
        let document = json!({
            "name": name,
            "type": kind.to_string(),
            "properties": { kind.enabled_property(): enabled },
        });
        Self {
            kind,
            name,
            document,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Current value of the enabled flag; a missing flag reads as disabled
    pub fn is_enabled(&self) -> bool {
        self.document
            .get("properties")
            .and_then(|props| props.get(self.kind.enabled_property()))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), ResourceError> {
        let key = self.kind.enabled_property();
        let Some(root) = self.document.as_object_mut() else {
            return Err(ResourceError::MalformedProperties {
                kind: self.kind,
                name: self.name.clone(),
            });
        };

        let properties = root
            .entry("properties")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        match properties.as_object_mut() {
            Some(props) => {
                props.insert(key.to_string(), Value::Bool(enabled));
                Ok(())
            }
            None => Err(ResourceError::MalformedProperties {
                kind: self.kind,
                name: self.name.clone(),
            }),
        }
    }

    pub fn into_document(self) -> Value {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_alert_enabled_flag() {
        let doc = json!({
            "name": "cpu-high",
            "location": "global",
            "properties": { "enabled": true, "severity": 2 }
        });
        let mut alert = MonitoredResource::from_document(ResourceKind::MetricAlert, doc).unwrap();
        assert!(alert.is_enabled());

        alert.set_enabled(false).unwrap();
        assert!(!alert.is_enabled());
        assert_eq!(alert.document()["properties"]["severity"], json!(2));
        assert_eq!(alert.document()["location"], json!("global"));
    }

    #[test]
    fn test_web_test_uses_capitalized_flag() {
        let doc = json!({ "name": "ping-home", "properties": { "Enabled": false } });
        let mut test = MonitoredResource::from_document(ResourceKind::AvailabilityTest, doc).unwrap();
        assert!(!test.is_enabled());

        test.set_enabled(true).unwrap();
        assert_eq!(test.document()["properties"]["Enabled"], json!(true));
        assert!(test.document()["properties"].get("enabled").is_none());
    }

    #[test]
    fn test_missing_flag_reads_as_disabled() {
        let doc = json!({ "name": "no-props" });
        let mut alert = MonitoredResource::from_document(ResourceKind::MetricAlert, doc).unwrap();
        assert!(!alert.is_enabled());

        alert.set_enabled(true).unwrap();
        assert!(alert.is_enabled());
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let err = MonitoredResource::from_document(ResourceKind::MetricAlert, json!({}))
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::MissingName {
                kind: ResourceKind::MetricAlert
            }
        );
    }

    #[test]
    fn test_non_object_properties_cannot_be_toggled() {
        let doc = json!({ "name": "odd", "properties": "nope" });
        let mut alert = MonitoredResource::from_document(ResourceKind::MetricAlert, doc).unwrap();
        assert!(alert.set_enabled(true).is_err());
    }

    #[test]
    fn test_kind_display_is_arm_type() {
        assert_eq!(
            ResourceKind::AvailabilityTest.to_string(),
            "Microsoft.Insights/webtests"
        );
    }
}
