//! Per-resource conditional toggle.
//!
//! Fetch the current snapshot, compare its `enabled` flag with the requested state and write
//! the document back only when they differ. Every failure is captured in the returned
//! [`ToggleOutcome`]; nothing here aborts a batch.

use super::action::ToggleAction;
use super::arm_client::ResourceClient;
use super::arm_errors::{ArmError, ErrorCategory};
use super::resource::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Fetch,
    Update,
}

/// Result of one toggle attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// State differed and the write succeeded
    Changed,
    /// State already matched, no write issued
    AlreadyInState,
    Failed {
        stage: FailureStage,
        category: ErrorCategory,
        reason: String,
    },
}

impl ToggleOutcome {
    fn failed(stage: FailureStage, error: &ArmError) -> Self {
        ToggleOutcome::Failed {
            stage,
            category: error.category(),
            reason: error.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToggleOutcome::Failed { .. })
    }

    /// Report line for this outcome
    pub fn message(&self, kind: ResourceKind, name: &str, action: ToggleAction) -> String {
        match self {
            ToggleOutcome::Changed => format!(
                "{} '{}' has been successfully {}.",
                kind.title(),
                name,
                action.past_tense()
            ),
            ToggleOutcome::AlreadyInState => format!(
                "{} '{}' is already {}.",
                kind.title(),
                name,
                action.past_tense()
            ),
            ToggleOutcome::Failed { reason, .. } => {
                format!("Error processing {} '{}': {}", kind.label(), name, reason)
            }
        }
    }
}

/// Bring one resource to the state requested by `action`
pub async fn toggle(
    client: &dyn ResourceClient,
    resource_group: &str,
    name: &str,
    action: ToggleAction,
) -> ToggleOutcome {
    let kind = client.kind();

    let mut resource = match client.get(resource_group, name).await {
        Ok(resource) => resource,
        Err(e) => {
            log_error!("Failed to fetch {} '{}': {}", kind.label(), name, e);
            return ToggleOutcome::failed(FailureStage::Fetch, &e);
        }
    };

    let desired = action.desired_state();
    if resource.is_enabled() == desired {
        log_debug!(
            "{} '{}' already {}, skipping write",
            kind.title(),
            name,
            action.past_tense()
        );
        return ToggleOutcome::AlreadyInState;
    }

    if let Err(e) = resource.set_enabled(desired) {
        let e = ArmError::from(e);
        log_error!("Cannot toggle {} '{}': {}", kind.label(), name, e);
        return ToggleOutcome::failed(FailureStage::Update, &e);
    }

    log_info!("{} {} '{}'", action.progressive(), kind.label(), name);
    match client.create_or_update(resource_group, name, &resource).await {
        Ok(_) => ToggleOutcome::Changed,
        Err(e) => {
            log_error!("Failed to update {} '{}': {}", kind.label(), name, e);
            ToggleOutcome::failed(FailureStage::Update, &e)
        }
    }
}
