use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Caller role attached to mutating requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Master,
    Manager,
    Staff,
}

impl FromStr for Role {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "master" => Ok(Self::Master),
            "manager" => Ok(Self::Manager),
            "staff" => Ok(Self::Staff),
            _ => Err(()),
        }
    }
}

/// Mutating operations gated by the capability matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateTemplate,
    UpdateTemplate,
    DeleteTemplate,
    CompleteTemplate,
    AddLibraryEntry,
    ActivateLibraryEntry,
}

impl Action {
    /// Label used in logs and rejection payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTemplate => "template.create",
            Self::UpdateTemplate => "template.update",
            Self::DeleteTemplate => "template.delete",
            Self::CompleteTemplate => "template.complete",
            Self::AddLibraryEntry => "library.add",
            Self::ActivateLibraryEntry => "library.activate",
        }
    }
}

/// Static capability matrix checked before every mutating operation.
///
/// Master and manager roles may administer templates; staff is read-only.
pub fn allows(role: Role, action: Action) -> bool {
    match role {
        Role::Master | Role::Manager => matches!(
            action,
            Action::CreateTemplate
                | Action::UpdateTemplate
                | Action::DeleteTemplate
                | Action::CompleteTemplate
                | Action::AddLibraryEntry
                | Action::ActivateLibraryEntry
        ),
        Role::Staff => false,
    }
}
