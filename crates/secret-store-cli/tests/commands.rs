// crates/secret-store-cli/tests/commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Migration and config commands against temporary databases.
// Purpose: Validate command results the binary prints as JSON.
// Dependencies: secret-store-cli, secret-store-config, tempfile
// ============================================================================

//! ## Overview
//! Drives the command functions with configs pointing at temporary `SQLite`
//! files, and checks that memory-store configs are refused for migrations.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use secret_store_cli::CliError;
use secret_store_cli::migrate_current;
use secret_store_cli::migrate_downgrade;
use secret_store_cli::migrate_history;
use secret_store_cli::migrate_upgrade;
use secret_store_cli::validate_config;
use secret_store_config::ConfigError;
use secret_store_config::SecretStoreConfig;
use secret_store_core::ErrorKind;
use secret_store_core::Revision;
use secret_store_core::ServiceError;
use secret_store_sqlite::METADATA_REVISION;
use secret_store_sqlite::SECRETS_REVISION;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn sqlite_config(dir: &Path) -> SecretStoreConfig {
    let db = dir.join("store.db").display().to_string();
    SecretStoreConfig::from_toml(&format!(
        "[store]\ntype = \"sqlite\"\npath = {db:?}\n\n[audit]\nsink = \"none\"\n"
    ))
    .unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn upgrade_current_and_history_report_head() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(dir.path());

    let before = migrate_current(&config).unwrap();
    assert_eq!(before.current, None);
    assert!(!before.at_head);

    let report = migrate_upgrade(&config, None).unwrap();
    assert_eq!(report.applied.len(), 2);
    let again = migrate_upgrade(&config, Some("head")).unwrap();
    assert!(again.is_noop());

    let after = migrate_current(&config).unwrap();
    assert_eq!(after.current, Some(Revision::new(METADATA_REVISION)));
    assert!(after.at_head);

    let history = migrate_history(&config).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|entry| entry.applied));

    let json = serde_json::to_value(&after).unwrap();
    assert_eq!(json["current"], METADATA_REVISION);
}

#[test]
fn downgrade_steps_back_one_revision() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(dir.path());
    migrate_upgrade(&config, None).unwrap();

    let report = migrate_downgrade(&config, SECRETS_REVISION).unwrap();
    assert_eq!(report.applied.len(), 1);
    assert_eq!(migrate_current(&config).unwrap().current, Some(Revision::new(SECRETS_REVISION)));

    let err = migrate_upgrade(&config, Some("base")).unwrap_err();
    let CliError::Service(service) = err else {
        panic!("expected service error");
    };
    assert!(matches!(service.kind(), ErrorKind::DatabaseMigrationError { .. }));
}

#[test]
fn migrations_require_sqlite_store() {
    let config = SecretStoreConfig::from_toml("").unwrap();
    let err = migrate_current(&config).unwrap_err();
    assert!(matches!(err, CliError::Config(_)));
    assert!(err.report().is_none());

    let store_failure = CliError::Config(ConfigError::Store(ServiceError::migration("behind head")));
    assert_eq!(store_failure.report().unwrap().kind, "database_migration_error");
}

#[test]
fn unknown_target_reports_structured_error() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(dir.path());
    let err = migrate_upgrade(&config, Some("deadbeef0000")).unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.kind, "database_migration_error");
}

#[test]
fn validate_summarizes_config() {
    let dir = TempDir::new().unwrap();
    let summary = validate_config(&sqlite_config(dir.path()));
    assert!(summary.valid);
    assert_eq!(summary.store, "sqlite");
    assert!(summary.auto_upgrade);
    assert_eq!(summary.target, "head");
}
