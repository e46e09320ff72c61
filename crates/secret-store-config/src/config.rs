// crates/secret-store-config/src/config.rs
// ============================================================================
// Module: Secret Store Configuration
// Description: Configuration loading and validation for the secret store.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: secret-store-core, secret-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown sections and fields are rejected; every section has defaults so
//! an empty file yields an in-memory store with auto-upgrade on.
//!
//! Resolution order: explicit path, then `SECRET_STORE_CONFIG`, then
//! `secret-store.toml` in the working directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use secret_store_core::AuditSink;
use secret_store_core::FileAuditSink;
use secret_store_core::InMemoryMetadataStore;
use secret_store_core::NoopAuditSink;
use secret_store_core::RevisionTarget;
use secret_store_core::SecretMetadataStore;
use secret_store_core::ServiceError;
use secret_store_core::StderrAuditSink;
use secret_store_core::set_strict_formatting;
use secret_store_sqlite::DEFAULT_BUSY_TIMEOUT_MS;
use secret_store_sqlite::SchemaPolicy;
use secret_store_sqlite::SqliteMetadataStore;
use secret_store_sqlite::SqliteJournalMode;
use secret_store_sqlite::SqliteStoreConfig;
use secret_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "secret-store.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SECRET_STORE_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound on the `SQLite` busy timeout.
const MAX_BUSY_TIMEOUT_MS: u64 = 10 * 60 * 1_000;

// ============================================================================
// SECTION: Root
// ============================================================================

/// Secret store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretStoreConfig {
    /// Metadata store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Schema migration behavior.
    #[serde(default)]
    pub migration: MigrationConfig,
    /// Error message rendering.
    #[serde(default)]
    pub errors: ErrorsConfig,
    /// Audit output.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl SecretStoreConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.migration.validate()?;
        self.audit.validate()
    }

    /// Applies process-wide settings: the error formatting mode.
    pub fn apply_process_settings(&self) {
        set_strict_formatting(self.errors.strict_formatting);
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn audit_sink(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        self.audit.build()
    }

    /// Opens the configured metadata store with the configured audit sink.
    ///
    /// A sqlite store is brought to head on open, or refused when it is
    /// behind head and `migration.auto_upgrade` is off.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened and
    /// [`ConfigError::Store`] when the sqlite store cannot be opened or
    /// migrated.
    pub fn open_metadata_store(&self) -> Result<Arc<dyn SecretMetadataStore>, ConfigError> {
        let audit = self.audit_sink()?;
        match self.store.store_type {
            StoreType::Memory => Ok(Arc::new(InMemoryMetadataStore::new().with_audit(audit))),
            StoreType::Sqlite => {
                let store = SqliteMetadataStore::open(
                    &self.store.sqlite()?,
                    self.migration.schema_policy(),
                    audit,
                )?;
                Ok(Arc::new(store))
            }
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Metadata store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_store_path("store.path", path)?;
                if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
                    return Err(ConfigError::Invalid(
                        "store.busy_timeout_ms out of range".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the store is not sqlite.
    pub fn sqlite(&self) -> Result<SqliteStoreConfig, ConfigError> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Ok(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => Err(ConfigError::Invalid(
                "this command requires store.type = \"sqlite\" with a path".to_string(),
            )),
        }
    }
}

/// Metadata store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Migration
// ============================================================================

/// Schema migration configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// Upgrade to head when the store opens.
    #[serde(default = "default_auto_upgrade")]
    pub auto_upgrade: bool,
    /// Default upgrade target for `migrate upgrade`.
    #[serde(default = "default_target")]
    pub target: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            auto_upgrade: default_auto_upgrade(),
            target: default_target(),
        }
    }
}

impl MigrationConfig {
    /// Validates migration configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.target().map(|_| ())
    }

    /// Returns the parsed upgrade target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the target is empty.
    pub fn target(&self) -> Result<RevisionTarget, ConfigError> {
        RevisionTarget::from_str(&self.target)
            .map_err(|_| ConfigError::Invalid("migration.target must be non-empty".to_string()))
    }

    /// Returns the schema policy for opening stores.
    #[must_use]
    pub const fn schema_policy(&self) -> SchemaPolicy {
        if self.auto_upgrade { SchemaPolicy::AutoUpgrade } else { SchemaPolicy::RequireHead }
    }
}

/// Returns the default auto-upgrade setting.
const fn default_auto_upgrade() -> bool {
    true
}

/// Returns the default upgrade target.
fn default_target() -> String {
    "head".to_string()
}

// ============================================================================
// SECTION: Error Rendering
// ============================================================================

/// Error rendering configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorsConfig {
    /// Treat message template failures as hard errors.
    #[serde(default)]
    pub strict_formatting: bool,
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_store_path("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires audit.path".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid with the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured sink.
    fn build(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires audit.path".to_string()))
            }
        }
    }
}

/// Audit sink kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard audit events.
    None,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The configured store could not be opened.
    #[error("store open failed: {0}")]
    Store(#[from] ServiceError),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from explicit input, env, or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured file path.
fn validate_store_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
