//! Identity errors.

use thiserror::Error;

/// Errors from resolving or authorizing a caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    /// The token is unknown or expired.
    #[error("unknown or invalid caller token")]
    InvalidToken,

    /// The caller lacks the required scope.
    #[error("actor {actor_id} lacks scope {scope}")]
    MissingScope {
        /// Resolved caller.
        actor_id: String,
        /// Required scope.
        scope: String,
    },

    /// Two credentials share a token.
    #[error("duplicate credential token for actor {actor_id}")]
    DuplicateToken {
        /// Actor of the second credential.
        actor_id: String,
    },

    /// A credential names an invalid actor id.
    #[error("invalid actor id in credential: {0}")]
    InvalidActor(#[from] crate::action::InvalidId),

    /// The identity service could not be consulted.
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}
