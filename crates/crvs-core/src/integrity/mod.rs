//! Per-event BLAKE3 hash chain over action content.
//!
//! Each appended action stores the hash of its predecessor (`prev_hash`) and
//! its own hash computed over `prev_hash || content`, where content is the
//! canonical JSON of the action at its position. The first action of an
//! event chains from [`ActionHasher::GENESIS_PREV_HASH`]. Any edit to a
//! stored action, or any reordering, breaks the chain from that point on.

use thiserror::Error;

use crate::action::{Action, ActionId};

/// Size of a BLAKE3 hash in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte hash.
pub type Hash = [u8; HASH_SIZE];

/// Errors raised while sealing or verifying a chain.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IntegrityError {
    /// The stored `prev_hash` does not match the predecessor's hash.
    #[error("chain broken at position {position} ({action_id}): expected prev {expected}, got {actual}")]
    ChainBroken {
        /// Offending action.
        action_id: ActionId,
        /// Its position.
        position: u64,
        /// Hash of the predecessor.
        expected: String,
        /// Stored `prev_hash`.
        actual: String,
    },

    /// The stored hash does not match the recomputed one.
    #[error("hash mismatch at position {position} ({action_id}): expected {expected}, got {actual}")]
    HashMismatch {
        /// Offending action.
        action_id: ActionId,
        /// Its position.
        position: u64,
        /// Recomputed hash.
        expected: String,
        /// Stored hash.
        actual: String,
    },

    /// Positions are not contiguous from 1.
    #[error("action {action_id} has position {found:?}, expected {expected}")]
    PositionGap {
        /// Offending action.
        action_id: ActionId,
        /// Expected position.
        expected: u64,
        /// Stored position.
        found: Option<u64>,
    },

    /// A stored hash is not 32 bytes of hex.
    #[error("action {action_id} carries a malformed hash")]
    MalformedHash {
        /// Offending action.
        action_id: ActionId,
    },

    /// Action content could not be serialised.
    #[error("cannot serialise action content: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Computes and checks action hashes.
pub struct ActionHasher;

impl ActionHasher {
    /// The zero hash used as `prev_hash` of the first action of every event.
    pub const GENESIS_PREV_HASH: Hash = [0u8; HASH_SIZE];

    /// Hashes content chained onto `prev_hash`.
    #[must_use]
    pub fn hash_content(content: &[u8], prev_hash: &Hash) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(prev_hash);
        hasher.update(content);
        *hasher.finalize().as_bytes()
    }

    /// Assigns `position`, `prev_hash` and `hash` to `action`, returning the
    /// new hash to chain the next action from.
    ///
    /// # Errors
    ///
    /// Returns an error if the action content cannot be serialised.
    pub fn seal(action: &mut Action, position: u64, prev_hash: &Hash) -> Result<Hash, IntegrityError> {
        let hash = Self::hash_content(&action.content_bytes(position)?, prev_hash);
        action.position = Some(position);
        action.prev_hash = Some(hex::encode(prev_hash));
        action.hash = Some(hex::encode(hash));
        Ok(hash)
    }

    /// Returns the hash of a sealed action, or genesis if `action` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::MalformedHash`] if the stored hash is not
    /// valid hex of the right length.
    pub fn head_hash(action: Option<&Action>) -> Result<Hash, IntegrityError> {
        match action {
            None => Ok(Self::GENESIS_PREV_HASH),
            Some(action) => decode_stored(action, action.hash.as_deref()),
        }
    }

    /// Verifies a complete event history from genesis.
    ///
    /// # Errors
    ///
    /// Returns the first broken link, mismatched hash or position gap.
    pub fn verify_chain(actions: &[Action]) -> Result<(), IntegrityError> {
        let mut expected_prev = Self::GENESIS_PREV_HASH;

        for (index, action) in actions.iter().enumerate() {
            let expected_position = index as u64 + 1;
            if action.position != Some(expected_position) {
                return Err(IntegrityError::PositionGap {
                    action_id: action.id,
                    expected: expected_position,
                    found: action.position,
                });
            }

            let prev = decode_stored(action, action.prev_hash.as_deref())?;
            if prev != expected_prev {
                return Err(IntegrityError::ChainBroken {
                    action_id: action.id,
                    position: expected_position,
                    expected: hex::encode(expected_prev),
                    actual: hex::encode(prev),
                });
            }

            let stored = decode_stored(action, action.hash.as_deref())?;
            let computed = Self::hash_content(&action.content_bytes(expected_position)?, &prev);
            if computed != stored {
                return Err(IntegrityError::HashMismatch {
                    action_id: action.id,
                    position: expected_position,
                    expected: hex::encode(computed),
                    actual: hex::encode(stored),
                });
            }

            expected_prev = stored;
        }

        Ok(())
    }
}

fn decode_stored(action: &Action, raw: Option<&str>) -> Result<Hash, IntegrityError> {
    let malformed = || IntegrityError::MalformedHash {
        action_id: action.id,
    };
    let mut hash = [0u8; HASH_SIZE];
    hex::decode_to_slice(raw.ok_or_else(malformed)?, &mut hash).map_err(|_| malformed())?;
    Ok(hash)
}
