//! Identifier newtypes.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of client-supplied identifiers (transaction ids, actor
/// ids, tokens).
pub const MAX_CLIENT_ID_LEN: usize = 128;

/// Separator between a transaction id and the suffix of an action chained
/// from it.
pub const CHAIN_SEPARATOR: char = ':';

/// Alphabet for tracking ids. Excludes `0`, `O`, `1` and `I`, which are easy
/// to confuse when read aloud or copied from paper.
const TRACKING_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Errors raised when parsing identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidId {
    /// Not a UUID.
    #[error("{kind} id `{raw}` is not a valid UUID")]
    NotUuid {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// The raw input.
        raw: String,
    },

    /// Empty or oversized client identifier.
    #[error("{kind} id must be 1..={MAX_CLIENT_ID_LEN} characters, got {len}")]
    BadLength {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// The observed length.
        len: usize,
    },

    /// Contains characters outside the printable ASCII range.
    #[error("{kind} id `{raw}` contains control or non-ASCII characters")]
    BadCharacters {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// The raw input.
        raw: String,
    },
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parses the hyphenated string form.
            ///
            /// # Errors
            ///
            /// Returns [`InvalidId::NotUuid`] if `raw` is not a UUID.
            pub fn parse(raw: &str) -> Result<Self, InvalidId> {
                Uuid::parse_str(raw).map(Self).map_err(|_| InvalidId::NotUuid {
                    kind: $kind,
                    raw: raw.to_string(),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_id!(
    /// Opaque identity of an event (one declaration and its history).
    EventId,
    "event"
);

uuid_id!(
    /// Identity of a single appended action.
    ActionId,
    "action"
);

fn check_client_id(kind: &'static str, raw: &str) -> Result<(), InvalidId> {
    if raw.is_empty() || raw.len() > MAX_CLIENT_ID_LEN {
        return Err(InvalidId::BadLength {
            kind,
            len: raw.len(),
        });
    }
    if !raw.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(InvalidId::BadCharacters {
            kind,
            raw: raw.to_string(),
        });
    }
    Ok(())
}

/// Client-supplied idempotency key, unique per logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    /// Validates and wraps a transaction id.
    ///
    /// # Errors
    ///
    /// Returns an error for empty, oversized or non-printable input.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidId> {
        let raw = raw.into();
        check_client_id("transaction", &raw)?;
        Ok(Self(raw))
    }

    /// Generates a random transaction id for callers that do not retry.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id used by an action chained from this request.
    #[must_use]
    pub fn chained(&self, suffix: &str) -> Self {
        Self(format!("{}{CHAIN_SEPARATOR}{suffix}", self.0))
    }

    /// Returns `true` if `other` is this id or an id chained from it.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        other.0 == self.0
            || other
                .0
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with(CHAIN_SEPARATOR))
    }

    /// Returns the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TransactionId {
    type Error = InvalidId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TransactionId> for String {
    fn from(value: TransactionId) -> Self {
        value.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a human or system actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    /// Validates and wraps an actor id.
    ///
    /// # Errors
    ///
    /// Returns an error for empty, oversized or non-printable input.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidId> {
        let raw = raw.into();
        check_client_id("actor", &raw)?;
        Ok(Self(raw))
    }

    /// Returns the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ActorId {
    type Error = InvalidId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ActorId> for String {
    fn from(value: ActorId) -> Self {
        value.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short human-shareable identifier printed on receipts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingId(String);

impl TrackingId {
    /// Generates a random tracking id of `len` characters.
    #[must_use]
    pub fn generate(len: usize) -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..len)
            .map(|_| char::from(TRACKING_ALPHABET[rng.gen_range(0..TRACKING_ALPHABET.len())]))
            .collect();
        Self(id)
    }

    /// Wraps a stored tracking id.
    #[must_use]
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
