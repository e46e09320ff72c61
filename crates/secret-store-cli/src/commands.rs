// crates/secret-store-cli/src/commands.rs
// ============================================================================
// Module: Secret Store CLI Commands
// Description: Migration and config commands behind the secret-store binary.
// Purpose: Keep command logic testable apart from argument parsing and I/O.
// Dependencies: secret-store-config, secret-store-core, secret-store-sqlite
// ============================================================================

//! ## Overview
//! Each command takes a loaded [`SecretStoreConfig`] and returns a
//! serializable result; the binary prints it as JSON. Migration commands
//! need a sqlite store and run the built-in chain through a
//! [`MigrationExecutor`] wired to the configured audit sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;
use std::sync::Arc;

use secret_store_config::ConfigError;
use secret_store_config::SecretStoreConfig;
use secret_store_config::StoreType;
use secret_store_core::ErrorReport;
use secret_store_core::HistoryEntry;
use secret_store_core::MigrationExecutor;
use secret_store_core::MigrationReport;
use secret_store_core::Revision;
use secret_store_core::RevisionTarget;
use secret_store_core::ServiceError;
use secret_store_sqlite::SqliteSchemaTarget;
use secret_store_sqlite::builtin_registry;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Command failures.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or is unusable for the command.
    #[error("{0}")]
    Config(#[from] ConfigError),
    /// Migration or store failure.
    #[error("{0}")]
    Service(#[from] ServiceError),
}

impl CliError {
    /// Returns the structured report for service failures.
    #[must_use]
    pub fn report(&self) -> Option<ErrorReport> {
        match self {
            Self::Config(ConfigError::Store(error)) | Self::Service(error) => {
                Some(error.to_report())
            }
            Self::Config(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Outputs
// ============================================================================

/// Output of `migrate current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentRevision {
    /// Applied revision, `None` at base.
    pub current: Option<Revision>,
    /// Latest revision in the chain.
    pub head: Option<Revision>,
    /// Whether the schema is at head.
    pub at_head: bool,
}

/// Output of `config validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSummary {
    /// Always true; invalid configs fail before this is built.
    pub valid: bool,
    /// Store backend.
    pub store: &'static str,
    /// Whether stores upgrade on open.
    pub auto_upgrade: bool,
    /// Default upgrade target.
    pub target: String,
    /// Whether template failures are hard errors.
    pub strict_formatting: bool,
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Upgrades to `to`, or to the configured target when absent.
///
/// # Errors
///
/// Returns [`CliError`] when the store is not sqlite or migration fails.
pub fn migrate_upgrade(
    config: &SecretStoreConfig,
    to: Option<&str>,
) -> Result<MigrationReport, CliError> {
    let target = match to {
        Some(value) => RevisionTarget::from_str(value)?,
        None => config.migration.target()?,
    };
    Ok(executor(config)?.upgrade_to(&target)?)
}

/// Downgrades to `to`.
///
/// # Errors
///
/// Returns [`CliError`] when the store is not sqlite or migration fails.
pub fn migrate_downgrade(config: &SecretStoreConfig, to: &str) -> Result<MigrationReport, CliError> {
    let target = RevisionTarget::from_str(to)?;
    Ok(executor(config)?.downgrade_to(&target)?)
}

/// Reports the applied revision.
///
/// # Errors
///
/// Returns [`CliError`] when the store is not sqlite or cannot be read.
pub fn migrate_current(config: &SecretStoreConfig) -> Result<CurrentRevision, CliError> {
    let executor = executor(config)?;
    let current = executor.current()?;
    let head = executor.registry().head().map(|step| step.revision.clone());
    Ok(CurrentRevision {
        at_head: current == head,
        current,
        head,
    })
}

/// Lists the chain with applied markers.
///
/// # Errors
///
/// Returns [`CliError`] when the store is not sqlite or cannot be read.
pub fn migrate_history(config: &SecretStoreConfig) -> Result<Vec<HistoryEntry>, CliError> {
    Ok(executor(config)?.history()?)
}

/// Summarizes a configuration that passed validation.
#[must_use]
pub fn validate_config(config: &SecretStoreConfig) -> ConfigSummary {
    ConfigSummary {
        valid: true,
        store: match config.store.store_type {
            StoreType::Memory => "memory",
            StoreType::Sqlite => "sqlite",
        },
        auto_upgrade: config.migration.auto_upgrade,
        target: config.migration.target.clone(),
        strict_formatting: config.errors.strict_formatting,
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an executor over the configured sqlite store.
fn executor(config: &SecretStoreConfig) -> Result<MigrationExecutor, CliError> {
    let sqlite = config.store.sqlite()?;
    let target = SqliteSchemaTarget::open(&sqlite)?;
    let audit = config.audit_sink()?;
    Ok(MigrationExecutor::new(Arc::new(builtin_registry()?), Arc::new(target), audit))
}
