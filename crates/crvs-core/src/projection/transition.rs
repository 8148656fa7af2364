//! Status state machine.
//!
//! ```text
//! None --CREATE--> Draft --NOTIFY--> Notified
//! Draft/Notified/Rejected --DECLARE--> Declared
//! Notified/Declared/Rejected --VALIDATE--> Validated
//! Declared/Validated --REGISTER--> Registered
//! Notified/Declared/Validated --REJECT--> Rejected
//! Draft..Validated, Rejected --ARCHIVE--> Archived --REINSTATE--> (previous)
//! Registered --PRINT_CERTIFICATE--> Registered
//! Registered --REQUEST_CORRECTION--> CorrectionRequested
//! CorrectionRequested --APPROVE_CORRECTION/REJECT_CORRECTION--> Registered
//! ```
//!
//! `ASSIGN`, `UNASSIGN`, `READ` and custom kinds are legal in every state
//! except `None` and never change the status.

use std::fmt;

use thiserror::Error;

use super::state::{EventStatus, status_name};
use crate::action::ActionKind;

/// An action kind is not legal for the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct TransitionError {
    /// Status the event is in (`None` if it does not exist).
    pub status: Option<EventStatus>,
    /// Attempted kind.
    pub kind: ActionKind,
    /// Kinds that are legal instead.
    pub legal: Vec<ActionKind>,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is not legal in status {}; legal: ",
            self.kind,
            status_name(self.status)
        )?;
        for (i, kind) in self.legal.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(kind.as_str())?;
        }
        Ok(())
    }
}

/// Lifecycle kinds legal in `status`, excluding the kinds legal everywhere.
fn lifecycle_kinds(status: Option<EventStatus>) -> Vec<ActionKind> {
    use ActionKind as K;
    use EventStatus as S;

    match status {
        None => vec![K::Create],
        Some(S::Draft) => vec![K::Notify, K::Declare, K::Archive],
        Some(S::Notified) => vec![K::Declare, K::Validate, K::Reject, K::Archive],
        Some(S::Declared) => vec![K::Validate, K::Register, K::Reject, K::Archive],
        Some(S::Validated) => vec![K::Register, K::Reject, K::Archive],
        Some(S::Rejected) => vec![K::Declare, K::Validate, K::Archive],
        Some(S::Archived) => vec![K::Reinstate],
        Some(S::Registered) => vec![K::PrintCertificate, K::RequestCorrection],
        Some(S::CorrectionRequested) => vec![K::ApproveCorrection, K::RejectCorrection],
    }
}

/// Returns the built-in kinds legal in `status`. Custom kinds are legal
/// whenever the event exists.
#[must_use]
pub fn legal_next_kinds(status: Option<EventStatus>) -> Vec<ActionKind> {
    let mut kinds = lifecycle_kinds(status);
    if status.is_some() {
        kinds.extend([ActionKind::Assign, ActionKind::Unassign, ActionKind::Read]);
    }
    kinds
}

/// Returns `true` if `kind` may be appended in `status`.
#[must_use]
pub fn is_legal(status: Option<EventStatus>, kind: &ActionKind) -> bool {
    match kind {
        ActionKind::Custom(_) => status.is_some(),
        other => legal_next_kinds(status).contains(other),
    }
}

/// Checks that `kind` may be appended in `status`.
///
/// # Errors
///
/// Returns a [`TransitionError`] listing the legal kinds otherwise.
pub fn check_transition(
    status: Option<EventStatus>,
    kind: &ActionKind,
) -> Result<(), TransitionError> {
    if is_legal(status, kind) {
        Ok(())
    } else {
        Err(TransitionError {
            status,
            kind: kind.clone(),
            legal: legal_next_kinds(status),
        })
    }
}

/// Status reached by applying a lifecycle `kind`.
///
/// Returns `None` for kinds that leave the status unchanged. `REINSTATE`
/// depends on the pre-archive status and is resolved by the reducer.
#[must_use]
pub const fn target_status(kind: &ActionKind) -> Option<EventStatus> {
    match kind {
        ActionKind::Create => Some(EventStatus::Draft),
        ActionKind::Notify => Some(EventStatus::Notified),
        ActionKind::Declare => Some(EventStatus::Declared),
        ActionKind::Validate => Some(EventStatus::Validated),
        ActionKind::Register | ActionKind::ApproveCorrection | ActionKind::RejectCorrection => {
            Some(EventStatus::Registered)
        },
        ActionKind::Reject => Some(EventStatus::Rejected),
        ActionKind::Archive => Some(EventStatus::Archived),
        ActionKind::RequestCorrection => Some(EventStatus::CorrectionRequested),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_create_is_legal_before_creation() {
        assert_eq!(legal_next_kinds(None), vec![ActionKind::Create]);
        assert!(!is_legal(None, &ActionKind::Read));
        assert!(!is_legal(None, &ActionKind::Custom("X".into())));
    }

    #[test]
    fn create_is_never_legal_twice() {
        assert!(!is_legal(Some(EventStatus::Draft), &ActionKind::Create));
    }

    #[test]
    fn bookkeeping_and_custom_kinds_are_legal_everywhere() {
        for status in [
            EventStatus::Draft,
            EventStatus::Registered,
            EventStatus::Archived,
            EventStatus::CorrectionRequested,
        ] {
            for kind in [ActionKind::Assign, ActionKind::Unassign, ActionKind::Read] {
                assert!(is_legal(Some(status), &kind), "{kind} in {status}");
            }
            assert!(is_legal(Some(status), &ActionKind::Custom("FLAG".into())));
        }
    }

    #[test]
    fn registered_is_closed_to_lifecycle_rewinds() {
        let registered = Some(EventStatus::Registered);
        for kind in [
            ActionKind::Declare,
            ActionKind::Validate,
            ActionKind::Reject,
            ActionKind::Archive,
        ] {
            assert!(!is_legal(registered, &kind), "{kind} after registration");
        }
        assert!(is_legal(registered, &ActionKind::PrintCertificate));
        assert!(is_legal(registered, &ActionKind::RequestCorrection));
    }

    #[test]
    fn transition_error_lists_legal_kinds() {
        let err = check_transition(Some(EventStatus::Draft), &ActionKind::Register).unwrap_err();
        assert_eq!(err.status, Some(EventStatus::Draft));
        assert!(err.legal.contains(&ActionKind::Declare));
        assert!(!err.legal.contains(&ActionKind::Register));
        let message = err.to_string();
        assert!(message.contains("REGISTER is not legal in status DRAFT"));
        assert!(message.contains("DECLARE"));
    }

    #[test]
    fn archived_only_reinstates() {
        let err = check_transition(Some(EventStatus::Archived), &ActionKind::Declare).unwrap_err();
        assert!(err.legal.contains(&ActionKind::Reinstate));
    }
}
