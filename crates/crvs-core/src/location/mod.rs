//! Location hierarchy seam.
//!
//! Locations form a tree (country, province, district, facility...). The
//! validator asks two questions: does a location exist, and does it fall
//! under a given jurisdiction. A location is within itself.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::BoxFuture;

/// Errors from the location hierarchy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LocationError {
    /// The locations file could not be read.
    #[error("failed to read locations file: {0}")]
    Io(#[from] std::io::Error),

    /// The locations file does not parse.
    #[error("failed to parse locations file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A location id is defined twice.
    #[error("location {id} is defined twice")]
    Duplicate {
        /// The repeated id.
        id: String,
    },

    /// A location names a parent that does not exist.
    #[error("location {id} has unknown parent {parent}")]
    UnknownParent {
        /// The child location.
        id: String,
        /// The missing parent.
        parent: String,
    },

    /// Following parents from a location returns to it.
    #[error("location {id} is its own ancestor")]
    Cycle {
        /// A location on the cycle.
        id: String,
    },

    /// The hierarchy source could not be consulted.
    #[error("location source unavailable: {0}")]
    Unavailable(String),
}

/// Answers existence and containment questions about locations.
pub trait LocationResolver: Send + Sync {
    /// Returns `true` if `id` is a known location.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Unavailable`] if the source fails.
    fn exists<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<bool, LocationError>>;

    /// Returns `true` if `child` is `parent` or lies below it.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Unavailable`] if the source fails.
    fn is_under_jurisdiction<'a>(
        &'a self,
        parent: &'a str,
        child: &'a str,
    ) -> BoxFuture<'a, Result<bool, LocationError>>;
}

/// One node of the hierarchy as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEntry {
    /// Location id.
    pub id: String,
    /// Parent id; `None` for a root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocationFile {
    #[serde(default)]
    locations: Vec<LocationEntry>,
}

/// In-memory location tree.
#[derive(Debug, Clone, Default)]
pub struct StaticLocationTree {
    parents: HashMap<String, Option<String>>,
}

impl StaticLocationTree {
    /// Builds a tree from `entries`.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate ids, unknown parents or cycles.
    pub fn from_entries(
        entries: impl IntoIterator<Item = LocationEntry>,
    ) -> Result<Self, LocationError> {
        let mut parents = HashMap::new();
        for entry in entries {
            if parents.contains_key(&entry.id) {
                return Err(LocationError::Duplicate { id: entry.id });
            }
            parents.insert(entry.id, entry.parent);
        }

        for (id, parent) in &parents {
            if let Some(parent) = parent {
                if !parents.contains_key(parent) {
                    return Err(LocationError::UnknownParent {
                        id: id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        let tree = Self { parents };
        for id in tree.parents.keys() {
            let mut steps = 0;
            let mut current = tree.parent_of(id);
            while let Some(next) = current {
                steps += 1;
                if steps > tree.parents.len() {
                    return Err(LocationError::Cycle { id: id.clone() });
                }
                current = tree.parent_of(next);
            }
        }
        Ok(tree)
    }

    /// Loads a tree from the `[[locations]]` array of a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML does not parse or the tree is invalid.
    pub fn from_toml(content: &str) -> Result<Self, LocationError> {
        let file: LocationFile = toml::from_str(content)?;
        Self::from_entries(file.locations)
    }

    /// Loads a tree from a TOML file.
    ///
    /// # Errors
    ///
    /// As [`StaticLocationTree::from_toml`], plus I/O errors.
    pub fn from_file(path: &Path) -> Result<Self, LocationError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).and_then(|p| p.as_deref())
    }

    /// Returns `true` if `id` is known.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// Returns `true` if `child` is `ancestor` or lies below it.
    #[must_use]
    pub fn is_within(&self, ancestor: &str, child: &str) -> bool {
        if !self.contains(child) {
            return false;
        }
        let mut current = Some(child);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }

    /// Returns the number of locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns `true` if the tree is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl LocationResolver for StaticLocationTree {
    fn exists<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<bool, LocationError>> {
        Box::pin(async move { Ok(self.contains(id)) })
    }

    fn is_under_jurisdiction<'a>(
        &'a self,
        parent: &'a str,
        child: &'a str,
    ) -> BoxFuture<'a, Result<bool, LocationError>> {
        Box::pin(async move { Ok(self.is_within(parent, child)) })
    }
}
