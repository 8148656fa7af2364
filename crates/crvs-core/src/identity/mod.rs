//! Caller identity and capability scopes.
//!
//! Every action kind maps to one required scope. The router asks the
//! [`ScopeChecker`] to resolve the caller's token and confirm the scope in
//! one call; token issuance lives outside this crate.

mod error;

use std::collections::BTreeSet;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use subtle::ConstantTimeEq;

pub use self::error::IdentityError;
use crate::BoxFuture;
use crate::action::{ActionKind, ActorId};

/// Scope for `CREATE`.
pub const SCOPE_CREATE: &str = "record.create";
/// Scope for `NOTIFY`.
pub const SCOPE_NOTIFY: &str = "record.notify";
/// Scope for `DECLARE`.
pub const SCOPE_DECLARE: &str = "record.declare";
/// Scope for `VALIDATE`.
pub const SCOPE_VALIDATE: &str = "record.validate";
/// Scope for `REGISTER`.
pub const SCOPE_REGISTER: &str = "record.register";
/// Scope for `REJECT`.
pub const SCOPE_REJECT: &str = "record.reject";
/// Scope for `ARCHIVE`.
pub const SCOPE_ARCHIVE: &str = "record.archive";
/// Scope for `REINSTATE`.
pub const SCOPE_REINSTATE: &str = "record.reinstate";
/// Scope for `PRINT_CERTIFICATE`.
pub const SCOPE_PRINT_CERTIFICATE: &str = "record.print-certificate";
/// Scope for `REQUEST_CORRECTION`.
pub const SCOPE_REQUEST_CORRECTION: &str = "record.request-correction";
/// Scope for `APPROVE_CORRECTION` and `REJECT_CORRECTION`.
pub const SCOPE_REVIEW_CORRECTION: &str = "record.review-correction";
/// Scope for `ASSIGN` and unassigning oneself.
pub const SCOPE_ASSIGN: &str = "record.assign";
/// Scope for `READ` and state queries.
pub const SCOPE_READ: &str = "record.read";
/// Additional scope for unassigning another actor.
pub const SCOPE_UNASSIGN_OTHERS: &str = "record.unassign-others";

/// Returns the scope required to submit `kind`.
#[must_use]
pub fn required_scope(kind: &ActionKind) -> String {
    let scope = match kind {
        ActionKind::Create => SCOPE_CREATE,
        ActionKind::Notify => SCOPE_NOTIFY,
        ActionKind::Declare => SCOPE_DECLARE,
        ActionKind::Validate => SCOPE_VALIDATE,
        ActionKind::Register => SCOPE_REGISTER,
        ActionKind::Reject => SCOPE_REJECT,
        ActionKind::Archive => SCOPE_ARCHIVE,
        ActionKind::Reinstate => SCOPE_REINSTATE,
        ActionKind::PrintCertificate => SCOPE_PRINT_CERTIFICATE,
        ActionKind::RequestCorrection => SCOPE_REQUEST_CORRECTION,
        ActionKind::ApproveCorrection | ActionKind::RejectCorrection => SCOPE_REVIEW_CORRECTION,
        ActionKind::Assign | ActionKind::Unassign => SCOPE_ASSIGN,
        ActionKind::Read => SCOPE_READ,
        ActionKind::Custom(name) => return format!("record.custom[{name}]"),
    };
    scope.to_string()
}

/// A resolved caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// The acting user.
    pub actor_id: ActorId,
    /// Every scope the caller holds.
    pub scopes: BTreeSet<String>,
}

impl Identity {
    /// Returns `true` if the caller holds `scope`.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// Resolves caller tokens and checks scopes.
pub trait ScopeChecker: Send + Sync {
    /// Resolves `token` and confirms it carries `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidToken`] or
    /// [`IdentityError::MissingScope`] when the caller may not proceed, and
    /// [`IdentityError::Unavailable`] if the service fails.
    fn authorize<'a>(
        &'a self,
        token: &'a SecretString,
        scope: &'a str,
    ) -> BoxFuture<'a, Result<Identity, IdentityError>>;
}

/// One static credential as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token.
    #[serde(serialize_with = "serialize_token")]
    pub token: SecretString,
    /// Actor the token resolves to.
    pub actor_id: String,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn serialize_token<S: Serializer>(token: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(token.expose_secret())
}

/// Compares two tokens in constant time.
#[must_use]
pub fn tokens_match(a: &SecretString, b: &SecretString) -> bool {
    bool::from(a.expose_secret().as_bytes().ct_eq(b.expose_secret().as_bytes()))
}

/// Token table backed scope checker.
#[derive(Debug, Clone, Default)]
pub struct StaticScopeChecker {
    entries: Vec<(SecretString, Identity)>,
}

impl StaticScopeChecker {
    /// Builds a checker from credentials.
    ///
    /// # Errors
    ///
    /// Returns an error for a repeated token or an invalid actor id.
    pub fn from_credentials(
        credentials: impl IntoIterator<Item = Credential>,
    ) -> Result<Self, IdentityError> {
        let mut entries: Vec<(SecretString, Identity)> = Vec::new();
        for credential in credentials {
            if entries
                .iter()
                .any(|(token, _)| tokens_match(token, &credential.token))
            {
                return Err(IdentityError::DuplicateToken {
                    actor_id: credential.actor_id,
                });
            }
            let identity = Identity {
                actor_id: ActorId::new(credential.actor_id)?,
                scopes: credential.scopes.into_iter().collect(),
            };
            entries.push((credential.token, identity));
        }
        Ok(Self { entries })
    }

    /// Resolves a token without checking scopes. Compares every entry.
    #[must_use]
    pub fn identity(&self, token: &SecretString) -> Option<&Identity> {
        self.entries
            .iter()
            .fold(None, |found, (candidate, identity)| {
                if tokens_match(candidate, token) {
                    Some(identity)
                } else {
                    found
                }
            })
    }
}

impl ScopeChecker for StaticScopeChecker {
    fn authorize<'a>(
        &'a self,
        token: &'a SecretString,
        scope: &'a str,
    ) -> BoxFuture<'a, Result<Identity, IdentityError>> {
        Box::pin(async move {
            let identity = self.identity(token).ok_or(IdentityError::InvalidToken)?;
            if identity.has_scope(scope) {
                Ok(identity.clone())
            } else {
                Err(IdentityError::MissingScope {
                    actor_id: identity.actor_id.to_string(),
                    scope: scope.to_string(),
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(token: &str, actor: &str, scopes: &[&str]) -> Credential {
        Credential {
            token: SecretString::from(token),
            actor_id: actor.into(),
            scopes: scopes.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn every_built_in_kind_has_a_scope() {
        for kind in ActionKind::BUILT_IN {
            assert!(required_scope(&kind).starts_with("record."), "{kind}");
        }
        assert_eq!(
            required_scope(&ActionKind::ApproveCorrection),
            required_scope(&ActionKind::RejectCorrection)
        );
        assert_eq!(
            required_scope(&ActionKind::Custom("FLAG_FRAUD".into())),
            "record.custom[FLAG_FRAUD]"
        );
    }

    #[tokio::test]
    async fn authorize_checks_token_then_scope() {
        let checker = StaticScopeChecker::from_credentials([
            credential("t-clerk", "clerk", &[SCOPE_DECLARE, SCOPE_READ]),
            credential("t-reg", "registrar", &[SCOPE_REGISTER]),
        ])
        .unwrap();

        let clerk = SecretString::from("t-clerk");
        let identity = checker.authorize(&clerk, SCOPE_DECLARE).await.unwrap();
        assert_eq!(identity.actor_id.as_str(), "clerk");
        assert!(identity.has_scope(SCOPE_READ));

        assert!(matches!(
            checker.authorize(&clerk, SCOPE_REGISTER).await,
            Err(IdentityError::MissingScope { scope, .. }) if scope == SCOPE_REGISTER
        ));
        assert!(matches!(
            checker.authorize(&SecretString::from("t-cler"), SCOPE_READ).await,
            Err(IdentityError::InvalidToken)
        ));
    }

    #[test]
    fn duplicate_tokens_are_rejected() {
        let result = StaticScopeChecker::from_credentials([
            credential("t", "a", &[]),
            credential("t", "b", &[]),
        ]);
        assert!(matches!(result, Err(IdentityError::DuplicateToken { actor_id }) if actor_id == "b"));
    }

    #[test]
    fn debug_does_not_print_tokens() {
        let credential = credential("secret-token", "a", &[]);
        assert!(!format!("{credential:?}").contains("secret-token"));

        let checker = StaticScopeChecker::from_credentials([credential]).unwrap();
        assert!(!format!("{checker:?}").contains("secret-token"));
    }

    #[test]
    fn token_comparison_is_exact() {
        let token = SecretString::from("t-clerk");
        assert!(tokens_match(&token, &SecretString::from("t-clerk")));
        assert!(!tokens_match(&token, &SecretString::from("t-clerk ")));
        assert!(!tokens_match(&token, &SecretString::from("T-CLERK")));
        assert!(!tokens_match(&token, &SecretString::from("")));
    }

    #[test]
    fn credentials_serialize_their_token() {
        let rendered = toml::to_string(&credential("t-clerk", "clerk", &[SCOPE_READ])).unwrap();
        assert!(rendered.contains("token = \"t-clerk\""));
    }
}
