//! Configuration parsing and management.
//!
//! A single TOML file wires the ledger, the collaborator timeouts and the
//! static collaborators used by the CLI:
//!
//! ```toml
//! schema_file = "schemas.toml"
//!
//! [ledger]
//! path = "crvs.db"
//! busy_timeout_ms = 5000
//!
//! [timeouts]
//! collaborator_ms = 2000
//! storage_ms = 5000
//!
//! [tracking]
//! length = 7
//!
//! [[locations]]
//! id = "country"
//!
//! [[credentials]]
//! token = "clerk-token"
//! actor_id = "clerk"
//! scopes = ["record.create", "record.declare"]
//! ```
//!
//! Every section is optional. Relative paths in a file loaded with
//! [`CoreConfig::from_file`] resolve against the file's directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::{Credential, tokens_match};
use crate::location::LocationEntry;
use crate::router::RouterConfig;

/// Ledger path meaning "no file".
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    /// Event-type schema file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<PathBuf>,

    /// Ledger storage.
    #[serde(default)]
    pub ledger: LedgerSection,

    /// Collaborator and storage limits.
    #[serde(default)]
    pub timeouts: TimeoutSection,

    /// Tracking id generation.
    #[serde(default)]
    pub tracking: TrackingSection,

    /// Static location tree.
    #[serde(default)]
    pub locations: Vec<LocationEntry>,

    /// Static token table.
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

impl CoreConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails [`CoreConfig::validate`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Checks the constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for zero timeouts or tracking
    /// length, duplicate credential tokens, and locations whose parent is not
    /// declared.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeouts.collaborator_ms == 0 {
            return Err(ConfigError::Validation(
                "timeouts.collaborator_ms must be greater than zero".to_string(),
            ));
        }
        if self.timeouts.storage_ms == 0 {
            return Err(ConfigError::Validation(
                "timeouts.storage_ms must be greater than zero".to_string(),
            ));
        }
        if self.tracking.length == 0 {
            return Err(ConfigError::Validation(
                "tracking.length must be greater than zero".to_string(),
            ));
        }

        for (index, credential) in self.credentials.iter().enumerate() {
            let repeated = self.credentials[..index]
                .iter()
                .any(|earlier| tokens_match(&earlier.token, &credential.token));
            if repeated {
                return Err(ConfigError::Validation(format!(
                    "duplicate credential token for actor '{}'",
                    credential.actor_id
                )));
            }
        }

        let mut ids: HashMap<&str, usize> = HashMap::new();
        for location in &self.locations {
            *ids.entry(location.id.as_str()).or_default() += 1;
        }
        if let Some((id, _)) = ids.iter().find(|(_, count)| **count > 1) {
            return Err(ConfigError::Validation(format!(
                "location '{id}' is declared more than once"
            )));
        }
        for location in &self.locations {
            if let Some(parent) = &location.parent {
                if !ids.contains_key(parent.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "location '{}' has undeclared parent '{parent}'",
                        location.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Some(schema_file) = &self.schema_file {
            if schema_file.is_relative() {
                self.schema_file = Some(base.join(schema_file));
            }
        }
        if !self.ledger.is_in_memory() && self.ledger.path.is_relative() {
            self.ledger.path = base.join(&self.ledger.path);
        }
    }

    /// Router limits derived from `[timeouts]`.
    #[must_use]
    pub const fn router_config(&self) -> RouterConfig {
        RouterConfig {
            collaborator_timeout: self.timeouts.collaborator(),
        }
    }
}

/// `[ledger]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSection {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,

    /// How long SQLite waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl LedgerSection {
    /// Returns `true` if the ledger lives in memory.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }

    /// Busy timeout as a [`Duration`].
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("crvs.db")
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// `[timeouts]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutSection {
    /// Limit for each schema, identity and location call.
    #[serde(default = "default_collaborator_ms")]
    pub collaborator_ms: u64,

    /// Limit for each ledger read or append.
    #[serde(default = "default_storage_ms")]
    pub storage_ms: u64,
}

impl TimeoutSection {
    /// Collaborator limit as a [`Duration`].
    #[must_use]
    pub const fn collaborator(&self) -> Duration {
        Duration::from_millis(self.collaborator_ms)
    }

    /// Storage limit as a [`Duration`].
    #[must_use]
    pub const fn storage(&self) -> Duration {
        Duration::from_millis(self.storage_ms)
    }
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            collaborator_ms: default_collaborator_ms(),
            storage_ms: default_storage_ms(),
        }
    }
}

const fn default_collaborator_ms() -> u64 {
    2_000
}

const fn default_storage_ms() -> u64 {
    5_000
}

/// `[tracking]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSection {
    /// Tracking id length.
    #[serde(default = "default_tracking_length")]
    pub length: usize,
}

impl Default for TrackingSection {
    fn default() -> Self {
        Self {
            length: default_tracking_length(),
        }
    }
}

const fn default_tracking_length() -> usize {
    7
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = CoreConfig::from_toml("").unwrap();
        assert_eq!(config.ledger, LedgerSection::default());
        assert!(config.credentials.is_empty());
        assert!(config.locations.is_empty());
        assert_eq!(config.timeouts.collaborator(), Duration::from_secs(2));
        assert_eq!(config.timeouts.storage(), Duration::from_secs(5));
        assert_eq!(config.tracking.length, 7);
        assert!(config.schema_file.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            schema_file = "/etc/crvs/schemas.toml"

            [ledger]
            path = ":memory:"
            busy_timeout_ms = 250

            [timeouts]
            collaborator_ms = 500
            storage_ms = 1500

            [tracking]
            length = 9

            [[locations]]
            id = "country"

            [[locations]]
            id = "ibombo"
            parent = "country"

            [[credentials]]
            token = "t1"
            actor_id = "clerk"
            scopes = ["record.create"]
        "#;

        let config = CoreConfig::from_toml(toml).unwrap();
        assert!(config.ledger.is_in_memory());
        assert_eq!(config.ledger.busy_timeout(), Duration::from_millis(250));
        assert_eq!(
            config.router_config().collaborator_timeout,
            Duration::from_millis(500)
        );
        assert_eq!(config.timeouts.storage(), Duration::from_millis(1500));
        assert_eq!(config.tracking.length, 9);
        assert_eq!(config.locations.len(), 2);
        assert_eq!(config.credentials[0].scopes, vec!["record.create"]);
    }

    #[test]
    fn config_rejects_zero_timeouts() {
        let err = CoreConfig::from_toml("[timeouts]\ncollaborator_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("collaborator_ms")));

        let err = CoreConfig::from_toml("[timeouts]\nstorage_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("storage_ms")));
    }

    #[test]
    fn config_rejects_duplicate_tokens() {
        let toml = r#"
            [[credentials]]
            token = "same"
            actor_id = "a"

            [[credentials]]
            token = "same"
            actor_id = "b"
        "#;
        let err = CoreConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("actor 'b'")));
    }

    #[test]
    fn config_rejects_undeclared_location_parent() {
        let toml = r#"
            [[locations]]
            id = "ibombo"
            parent = "central"
        "#;
        let err = CoreConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("'central'")));
    }

    #[test]
    fn config_rejects_unknown_field_types() {
        let err = CoreConfig::from_toml("[tracking]\nlength = \"seven\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let mut config = CoreConfig::default();
        config.locations.push(LocationEntry {
            id: "country".into(),
            parent: None,
        });
        config.credentials.push(Credential {
            token: "t1".into(),
            actor_id: "clerk".into(),
            scopes: vec!["record.read".into()],
        });
        let rendered = config.to_toml().unwrap();
        let reparsed = CoreConfig::from_toml(&rendered).unwrap();
        assert_eq!(reparsed.to_toml().unwrap(), rendered);
        assert_eq!(reparsed.credentials[0].token.expose_secret(), "t1");
    }

    #[test]
    fn relative_paths_resolve_against_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crvs.toml");
        std::fs::write(
            &path,
            "schema_file = \"schemas.toml\"\n[ledger]\npath = \"data/crvs.db\"\n",
        )
        .unwrap();

        let config = CoreConfig::from_file(&path).unwrap();
        assert_eq!(config.schema_file, Some(dir.path().join("schemas.toml")));
        assert_eq!(config.ledger.path, dir.path().join("data/crvs.db"));
    }

    #[test]
    fn in_memory_ledger_path_is_not_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crvs.toml");
        std::fs::write(&path, "[ledger]\npath = \":memory:\"\n").unwrap();

        let config = CoreConfig::from_file(&path).unwrap();
        assert!(config.ledger.is_in_memory());
    }
}
