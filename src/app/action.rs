use std::fmt;

/// Requested state change for every matched resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ToggleAction {
    Enable,
    Disable,
}

impl ToggleAction {
    /// Value of the `enabled` flag once the action has been applied
    pub fn desired_state(self) -> bool {
        matches!(self, ToggleAction::Enable)
    }

    /// Past participle used in report lines ("enabled" / "disabled")
    pub fn past_tense(self) -> &'static str {
        match self {
            ToggleAction::Enable => "enabled",
            ToggleAction::Disable => "disabled",
        }
    }

    /// Progressive form used in log records
    pub fn progressive(self) -> &'static str {
        match self {
            ToggleAction::Enable => "Enabling",
            ToggleAction::Disable => "Disabling",
        }
    }
}

impl fmt::Display for ToggleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleAction::Enable => f.write_str("enable"),
            ToggleAction::Disable => f.write_str("disable"),
        }
    }
}
