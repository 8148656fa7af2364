//! Memoised projections.

// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::state::ProjectedState;
use crate::action::{ActionId, EventId};

/// Default number of events kept by a [`ProjectionCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

struct Inner {
    entries: HashMap<EventId, ProjectedState>,
    order: VecDeque<EventId>,
}

/// Bounded cache of folded projections.
///
/// An entry is only served while its `last_action_id` matches the head of
/// the event's history; anything else is a miss and the caller refolds.
/// Entries are replaced wholesale, never patched. Eviction is FIFO.
pub struct ProjectionCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl ProjectionCache {
    /// Creates a cache holding at most `capacity` events. A capacity of zero
    /// disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Returns the cached projection of `event_id` if it was folded up to
    /// `last_action_id`.
    #[must_use]
    pub fn get(&self, event_id: &EventId, last_action_id: &ActionId) -> Option<ProjectedState> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .get(event_id)
            .filter(|state| state.last_action_id == *last_action_id)
            .cloned()
    }

    /// Stores a freshly folded projection, replacing any older entry.
    pub fn insert(&self, state: ProjectedState) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        let event_id = state.event_id;
        if inner.entries.insert(event_id, state).is_none() {
            inner.order.push_back(event_id);
            while inner.order.len() > self.capacity {
                if let Some(evicted) = inner.order.pop_front() {
                    inner.entries.remove(&evicted);
                }
            }
        }
    }

    /// Drops the entry for `event_id`.
    pub fn invalidate(&self, event_id: &EventId) {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.remove(event_id).is_some() {
            inner.order.retain(|id| id != event_id);
        }
    }

    /// Returns the number of cached events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProjectionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for ProjectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
