//! Batch driver: list, match, toggle, report.
//!
//! The driver writes one line per match decision and one per toggle outcome to the supplied
//! writer, followed by a summary line. Input and discovery failures stop the run before any
//! toggle is attempted; per-resource failures are recorded in the [`BatchReport`] and the run
//! continues. A report line that cannot be written is logged and the run carries on, since
//! the toggles are the side effects that matter.

use super::action::ToggleAction;
use super::arm_client::ResourceClient;
use super::arm_errors::{ArmError, ErrorCategory};
use super::resource::ResourceKind;
use super::toggle::{toggle, FailureStage, ToggleOutcome};
use super::wildcards::{WildcardError, WildcardSet};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Immutable description of one invocation
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub action: ToggleAction,
    pub resource_group: String,
    pub wildcards: WildcardSet,
}

#[derive(Debug, Error)]
pub enum BatchError {
    /// Wildcard file missing, unreadable or empty
    #[error("{}", describe_input(.0))]
    Input(#[from] WildcardError),
    /// The resource set could not be listed
    #[error("Error fetching {plural} for resource group '{resource_group}': {source}")]
    Discovery {
        plural: &'static str,
        resource_group: String,
        #[source]
        source: ArmError,
    },
}

fn describe_input(error: &WildcardError) -> String {
    match error {
        WildcardError::Unreadable { .. } => format!("Error reading wildcard file: {}", error),
        _ => format!("Error: {}", error),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFailure {
    pub name: String,
    pub stage: FailureStage,
    pub category: ErrorCategory,
}

/// Aggregated outcomes of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub listed: usize,
    pub matched: usize,
    pub changed: usize,
    pub already_in_state: usize,
    pub failures: Vec<ResourceFailure>,
}

impl BatchReport {
    fn record(&mut self, name: &str, outcome: ToggleOutcome) {
        match outcome {
            ToggleOutcome::Changed => self.changed += 1,
            ToggleOutcome::AlreadyInState => self.already_in_state += 1,
            ToggleOutcome::Failed {
                stage, category, ..
            } => self.failures.push(ResourceFailure {
                name: name.to_string(),
                stage,
                category,
            }),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when every matched resource reached the requested state
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self, kind: ResourceKind, action: ToggleAction) -> String {
        let mut line = format!(
            "Summary: {} {} listed, {} matched, {} {}, {} already {}, {} failed",
            self.listed,
            kind.plural(),
            self.matched,
            self.changed,
            action.past_tense(),
            self.already_in_state,
            action.past_tense(),
            self.failed()
        );

        if !self.failures.is_empty() {
            let mut by_label: BTreeMap<&'static str, usize> = BTreeMap::new();
            for failure in &self.failures {
                *by_label.entry(failure.category.short_label()).or_default() += 1;
            }
            let breakdown: Vec<String> = by_label
                .iter()
                .map(|(label, count)| format!("{} {}", count, label))
                .collect();
            line.push_str(&format!(" ({})", breakdown.join(", ")));

            if self.failures.iter().any(|f| f.category.is_retryable()) {
                line.push_str("; transient failures may succeed on rerun");
            }
        }

        line
    }
}

/// Write one report line
fn emit(out: &mut dyn Write, line: &str) {
    if let Err(e) = writeln!(out, "{}", line) {
        log_warn!("Failed to write report line '{}': {}", line, e);
    }
}

/// Load the wildcard file, then process the resource group.
///
/// No remote call is made unless the wildcard file yields at least one pattern.
pub async fn run(
    client: &dyn ResourceClient,
    action: ToggleAction,
    wildcard_file: &Path,
    resource_group: &str,
    out: &mut dyn Write,
) -> Result<BatchReport, BatchError> {
    let wildcards = WildcardSet::load(wildcard_file)?;
    let request = ActionRequest {
        action,
        resource_group: resource_group.to_string(),
        wildcards,
    };
    execute(client, &request, out).await
}

/// Process a resource group with an already validated request
pub async fn execute(
    client: &dyn ResourceClient,
    request: &ActionRequest,
    out: &mut dyn Write,
) -> Result<BatchReport, BatchError> {
    let kind = client.kind();
    let resource_group = request.resource_group.as_str();
    log_info!(
        "Running {} on {} in resource group '{}' with {} wildcard(s)",
        request.action,
        kind.plural(),
        resource_group,
        request.wildcards.len()
    );

    let resources = client
        .list_by_resource_group(resource_group)
        .await
        .map_err(|source| {
            log_error!(
                "Listing {} in '{}' failed: {}",
                kind.plural(),
                resource_group,
                source
            );
            BatchError::Discovery {
                plural: kind.plural(),
                resource_group: resource_group.to_string(),
                source,
            }
        })?;

    let mut report = BatchReport {
        listed: resources.len(),
        ..BatchReport::default()
    };

    for resource in &resources {
        let name = resource.name();
        let Some(pattern) = request.wildcards.first_match(name) else {
            log_trace!("{} '{}' matches no wildcard", kind.title(), name);
            continue;
        };

        report.matched += 1;
        emit(
            out,
            &format!(
                "Processing {}: {} (matched wildcard: {})",
                kind.label(),
                name,
                pattern
            ),
        );

        let outcome = toggle(client, resource_group, name, request.action).await;
        emit(out, &outcome.message(kind, name, request.action));
        report.record(name, outcome);
    }

    emit(out, &report.summary(kind, request.action));
    log_info!(
        "Finished: {} matched, {} changed, {} failed",
        report.matched,
        report.changed,
        report.failed()
    );
    Ok(report)
}
