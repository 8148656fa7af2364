//! Builds the ledger and router from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use crvs_core::ActionRouter;
use crvs_core::config::CoreConfig;
use crvs_core::identity::StaticScopeChecker;
use crvs_core::ledger::{EventLedger, SqliteLedger};
use crvs_core::location::StaticLocationTree;
use crvs_core::schema::StaticSchemaProvider;
use tracing::debug;

/// Opens the configured ledger.
pub fn ledger(config: &CoreConfig) -> Result<Arc<EventLedger>> {
    let backend = if config.ledger.is_in_memory() {
        SqliteLedger::in_memory().context("failed to open in-memory ledger")?
    } else {
        let path = &config.ledger.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        SqliteLedger::open_with_busy_timeout(path, config.ledger.busy_timeout())
            .with_context(|| format!("failed to open ledger {}", path.display()))?
    };
    debug!(path = %config.ledger.path.display(), "ledger opened");

    Ok(Arc::new(
        EventLedger::new(Arc::new(backend))
            .with_storage_timeout(config.timeouts.storage())
            .with_tracking_length(config.tracking.length),
    ))
}

/// Wires a router against the configured ledger and static collaborators.
pub fn router(config: &CoreConfig) -> Result<ActionRouter> {
    let schemas = match &config.schema_file {
        Some(path) => StaticSchemaProvider::from_file(path)
            .with_context(|| format!("failed to load schemas from {}", path.display()))?,
        None => StaticSchemaProvider::new(),
    };
    let scopes = StaticScopeChecker::from_credentials(config.credentials.iter().cloned())
        .context("invalid credentials")?;
    let locations = StaticLocationTree::from_entries(config.locations.iter().cloned())
        .context("invalid location tree")?;
    debug!(
        event_types = schemas.event_types().len(),
        locations = locations.len(),
        "collaborators loaded"
    );

    Ok(ActionRouter::new(
        ledger(config)?,
        Arc::new(schemas),
        Arc::new(scopes),
        Arc::new(locations),
        config.router_config(),
    ))
}
