//! Action kinds and their pipeline classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a custom action kind name.
pub const MAX_CUSTOM_KIND_LEN: usize = 64;

/// Kind string is neither built in nor a valid custom kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid action kind `{value}`: expected SCREAMING_SNAKE_CASE")]
pub struct InvalidActionKind {
    /// The rejected input.
    pub value: String,
}

/// What an action does to an event.
///
/// Kinds render and parse as `SCREAMING_SNAKE_CASE` strings. Any other
/// well-formed name parses as [`ActionKind::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionKind {
    /// Creates the event. Always the first action.
    Create,
    /// Submits an incomplete declaration for later completion.
    Notify,
    /// Submits a declaration.
    Declare,
    /// Marks a declaration as validated.
    Validate,
    /// Registers the declaration.
    Register,
    /// Sends a declaration back for re-declaration.
    Reject,
    /// Archives the record. Not a deletion.
    Archive,
    /// Re-activates an archived record.
    Reinstate,
    /// Requests a correction of a registered record.
    RequestCorrection,
    /// Approves the pending correction request.
    ApproveCorrection,
    /// Rejects the pending correction request.
    RejectCorrection,
    /// Prints a certificate for a registered record.
    PrintCertificate,
    /// Takes the exclusive mutation lock.
    Assign,
    /// Releases the exclusive mutation lock.
    Unassign,
    /// Records that the record was read.
    Read,
    /// A deployment-specific kind.
    Custom(String),
}

/// How the request pipeline treats an action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionClass {
    /// `CREATE`: creates the event, assigning the creator.
    Creation,
    /// `READ`: bypasses assignment and validation.
    ReadOnly,
    /// `ASSIGN` / `UNASSIGN`: governed by assignment policy only.
    Assignment,
    /// Everything else: requires the caller to hold the assignment.
    Mutating,
}

impl ActionKind {
    /// Built-in kinds, in lifecycle order.
    pub const BUILT_IN: [Self; 15] = [
        Self::Create,
        Self::Notify,
        Self::Declare,
        Self::Validate,
        Self::Register,
        Self::Reject,
        Self::Archive,
        Self::Reinstate,
        Self::RequestCorrection,
        Self::ApproveCorrection,
        Self::RejectCorrection,
        Self::PrintCertificate,
        Self::Assign,
        Self::Unassign,
        Self::Read,
    ];

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "CREATE",
            Self::Notify => "NOTIFY",
            Self::Declare => "DECLARE",
            Self::Validate => "VALIDATE",
            Self::Register => "REGISTER",
            Self::Reject => "REJECT",
            Self::Archive => "ARCHIVE",
            Self::Reinstate => "REINSTATE",
            Self::RequestCorrection => "REQUEST_CORRECTION",
            Self::ApproveCorrection => "APPROVE_CORRECTION",
            Self::RejectCorrection => "REJECT_CORRECTION",
            Self::PrintCertificate => "PRINT_CERTIFICATE",
            Self::Assign => "ASSIGN",
            Self::Unassign => "UNASSIGN",
            Self::Read => "READ",
            Self::Custom(name) => name,
        }
    }

    /// Parses a kind string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidActionKind`] if the string is not a built-in kind and
    /// not a well-formed custom kind.
    pub fn parse(value: &str) -> Result<Self, InvalidActionKind> {
        if let Some(kind) = Self::BUILT_IN.iter().find(|k| k.as_str() == value) {
            return Ok(kind.clone());
        }
        let well_formed = !value.is_empty()
            && value.len() <= MAX_CUSTOM_KIND_LEN
            && value.starts_with(|c: char| c.is_ascii_uppercase())
            && value
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if well_formed {
            Ok(Self::Custom(value.to_string()))
        } else {
            Err(InvalidActionKind {
                value: value.to_string(),
            })
        }
    }

    /// Returns the pipeline class of this kind.
    #[must_use]
    pub const fn class(&self) -> ActionClass {
        match self {
            Self::Create => ActionClass::Creation,
            Self::Read => ActionClass::ReadOnly,
            Self::Assign | Self::Unassign => ActionClass::Assignment,
            _ => ActionClass::Mutating,
        }
    }

    /// Returns `true` if the caller must hold the assignment.
    #[must_use]
    pub const fn requires_assignment(&self) -> bool {
        matches!(self.class(), ActionClass::Mutating)
    }

    /// Returns `true` if a successful append is followed by an automatic
    /// `UNASSIGN`.
    #[must_use]
    pub const fn auto_unassigns(&self) -> bool {
        matches!(self, Self::Register | Self::PrintCertificate)
    }

    /// Returns `true` if this kind may carry a declaration payload.
    #[must_use]
    pub const fn accepts_declaration(&self) -> bool {
        !matches!(
            self,
            Self::Read | Self::Assign | Self::Unassign | Self::RejectCorrection
        )
    }

    /// Returns `true` for kinds that record bookkeeping rather than a change
    /// to the declaration's lifecycle.
    #[must_use]
    pub const fn is_bookkeeping(&self) -> bool {
        matches!(self, Self::Read | Self::Assign | Self::Unassign)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = InvalidActionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ActionKind {
    type Error = InvalidActionKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ActionKind> for String {
    fn from(value: ActionKind) -> Self {
        match value {
            ActionKind::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}
