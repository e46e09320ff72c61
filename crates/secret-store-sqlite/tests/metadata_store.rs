// crates/secret-store-sqlite/tests/metadata_store.rs
// ============================================================================
// Module: SQLite Metadata Store Tests
// Description: Metadata reads and writes against SQLite files.
// Purpose: Validate soft-delete, key uniqueness, and schema gating on disk.
// ============================================================================

//! ## Overview
//! Exercises [`SqliteMetadataStore`] end to end:
//! - Opening requires a schema at head unless auto-upgrade is on.
//! - Soft-delete is idempotent and frees the key for reuse.
//! - Records survive reopening the database.
//! - Foreign keys reject metadata for unknown secrets and guard secret removal.

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;
use rusqlite::Connection;
use secret_store_core::ErrorKind;
use secret_store_core::ManualClock;
use secret_store_core::MetadataId;
use secret_store_core::MetadataStatus;
use secret_store_core::MetadataUpdate;
use secret_store_core::MigrationExecutor;
use secret_store_core::NewMetadata;
use secret_store_core::NoopAuditSink;
use secret_store_core::RevisionTarget;
use secret_store_core::SecretId;
use secret_store_core::SecretMetadataStore;
use secret_store_core::SecretStoreMetadata;
use secret_store_core::Timestamp;
use secret_store_core::Visibility;
use secret_store_sqlite::SchemaPolicy;
use secret_store_sqlite::SqliteMetadataStore;
use secret_store_sqlite::SqliteSchemaTarget;
use secret_store_sqlite::SqliteStoreConfig;
use secret_store_sqlite::builtin_registry;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open_store(path: &Path) -> (SqliteMetadataStore, ManualClock) {
    let clock = ManualClock::new(Timestamp::from_unix_millis(1_000));
    let store = SqliteMetadataStore::open_default(&SqliteStoreConfig::new(path))
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    (store, clock)
}

fn store_with_secret(dir: &TempDir, secret: &str) -> (SqliteMetadataStore, ManualClock) {
    let (store, clock) = open_store(&dir.path().join("store.db"));
    store.insert_secret(&SecretId::new(secret), Some("tls cert")).unwrap();
    (store, clock)
}

fn new_metadata(secret: &str, key: &str, value: &str) -> NewMetadata {
    NewMetadata::new(SecretId::new(secret), key, value, MetadataStatus::active())
}

fn rename(key: &str) -> MetadataUpdate {
    MetadataUpdate::from_fields([("key", key)]).unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn require_head_refuses_unmigrated_database() {
    let dir = TempDir::new().unwrap();
    let config = SqliteStoreConfig::new(dir.path().join("store.db"));

    let err = SqliteMetadataStore::open(&config, SchemaPolicy::RequireHead, Arc::new(NoopAuditSink))
        .err()
        .unwrap();
    assert!(matches!(err.kind(), ErrorKind::DatabaseMigrationError { .. }));
    assert!(err.message().contains("base"));

    SqliteMetadataStore::open(&config, SchemaPolicy::AutoUpgrade, Arc::new(NoopAuditSink)).unwrap();
    SqliteMetadataStore::open(&config, SchemaPolicy::RequireHead, Arc::new(NoopAuditSink)).unwrap();
}

#[test]
fn create_and_get_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let (store, _clock) = store_with_secret(&dir, "S");
    let created = store.create(new_metadata("S", "cert_ref", "v1")).unwrap();
    assert!(!created.deleted);
    assert_eq!(created.deleted_at, None);
    assert_eq!(created.created_at, Timestamp::from_unix_millis(1_000));
    drop(store);

    let (reopened, _clock) = open_store(&dir.path().join("store.db"));
    let loaded = reopened.get(&created.id, Visibility::ActiveOnly).unwrap().unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn create_for_unknown_secret_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (store, _clock) = store_with_secret(&dir, "S");
    let err = store.create(new_metadata("missing", "k", "v")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::NotFound);
    assert_eq!(err.message(), "Secret missing not found.");

    for secret in ["{{x}}", "{id}"] {
        let err = store.create(new_metadata(secret, "k", "v")).unwrap_err();
        assert_eq!(err.try_message().unwrap(), format!("Secret {secret} not found."));
    }
}

#[test]
fn write_blocked_past_busy_timeout_is_a_connection_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let mut config = SqliteStoreConfig::new(&path);
    config.busy_timeout_ms = 50;
    let store =
        SqliteMetadataStore::open(&config, SchemaPolicy::AutoUpgrade, Arc::new(NoopAuditSink))
            .unwrap();
    store.insert_secret(&SecretId::new("S"), None).unwrap();

    let holder = Connection::open(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();
    let err = store.create(new_metadata("S", "cert_ref", "v1")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ClientConnectionError);
    assert_eq!(err.retry_after(), None);

    holder.execute_batch("ROLLBACK;").unwrap();
    store.create(new_metadata("S", "cert_ref", "v1")).unwrap();
}

#[test]
fn duplicate_active_key_is_rejected_until_soft_deleted() {
    let dir = TempDir::new().unwrap();
    let (store, _clock) = store_with_secret(&dir, "S");
    let first = store.create(new_metadata("S", "cert_ref", "v1")).unwrap();

    let err = store.create(new_metadata("S", "cert_ref", "v2")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Duplicate);

    store.soft_delete(&first.id).unwrap();
    let second = store.create(new_metadata("S", "cert_ref", "v2")).unwrap();
    assert_ne!(second.id, first.id);
}

#[test]
fn soft_delete_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (store, clock) = store_with_secret(&dir, "S");
    let record = store.create(new_metadata("S", "k", "v")).unwrap();

    clock.advance(50);
    let once = store.soft_delete(&record.id).unwrap();
    assert!(once.deleted);
    assert_eq!(once.deleted_at, Some(Timestamp::from_unix_millis(1_050)));
    assert_eq!(once.updated_at, Timestamp::from_unix_millis(1_050));

    clock.advance(50);
    let twice = store.soft_delete(&record.id).unwrap();
    assert_eq!(twice, once);

    assert!(store.get(&record.id, Visibility::ActiveOnly).unwrap().is_none());
    let audit = store.get(&record.id, Visibility::IncludeDeleted).unwrap().unwrap();
    assert_eq!(audit, once);
}

#[test]
fn soft_delete_of_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (store, _clock) = store_with_secret(&dir, "S");
    let err = store.soft_delete(&MetadataId::new("nope")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::NotFound);
}

#[test]
fn list_orders_by_creation_and_respects_visibility() {
    let dir = TempDir::new().unwrap();
    let (store, clock) = store_with_secret(&dir, "S");
    store.insert_secret(&SecretId::new("T"), None).unwrap();
    let a = store.create(new_metadata("S", "a", "1")).unwrap();
    clock.advance(10);
    let b = store.create(new_metadata("S", "b", "2")).unwrap();
    store.create(new_metadata("T", "a", "3")).unwrap();
    store.soft_delete(&a.id).unwrap();

    let active = store.list(&SecretId::new("S"), Visibility::ActiveOnly).unwrap();
    assert_eq!(active.iter().map(|record| record.id.clone()).collect::<Vec<_>>(), vec![b.id]);

    let all = store.list(&SecretId::new("S"), Visibility::IncludeDeleted).unwrap();
    let keys: Vec<&str> = all.iter().map(|record| record.key.as_str()).collect();
    assert_eq!(keys, vec!["a", "b"]);
}

#[test]
fn update_changes_fields_and_guards_keys() {
    let dir = TempDir::new().unwrap();
    let (store, clock) = store_with_secret(&dir, "S");
    let first = store.create(new_metadata("S", "a", "1")).unwrap();
    store.create(new_metadata("S", "b", "2")).unwrap();

    let err = store.update(&first.id, &rename("b")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Duplicate);

    clock.set(Timestamp::from_unix_millis(10));
    let update = MetadataUpdate::from_fields([("value", "9"), ("status", "pending")]).unwrap();
    let updated = store.update(&first.id, &update).unwrap();
    assert_eq!(updated.value, "9");
    assert_eq!(updated.status.as_str(), MetadataStatus::PENDING);
    assert_eq!(updated.updated_at, updated.created_at);

    let reloaded = store.get(&first.id, Visibility::ActiveOnly).unwrap().unwrap();
    assert_eq!(reloaded, updated);

    let err = store.update(&first.id, &MetadataUpdate::default()).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::NoDataToProcess);

    store.soft_delete(&first.id).unwrap();
    let err = store.update(&first.id, &rename("c")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::NotFound);
}

#[test]
fn removing_referenced_secret_is_in_use() {
    let dir = TempDir::new().unwrap();
    let (store, _clock) = store_with_secret(&dir, "S");
    store.create(new_metadata("S", "k", "v")).unwrap();

    let err = store.remove_secret(&SecretId::new("S")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InUseByStore);
    let err = store.remove_secret(&SecretId::new("missing")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::NotFound);
    let err = store.insert_secret(&SecretId::new("S"), None).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Duplicate);

    store.insert_secret(&SecretId::new("empty"), None).unwrap();
    store.remove_secret(&SecretId::new("empty")).unwrap();
}

#[test]
fn corrupt_rows_surface_as_server_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let (store, _clock) = store_with_secret(&dir, "S");
    let record = store.create(new_metadata("S", "k", "v")).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute("UPDATE secret_store_metadata SET deleted = 1 WHERE id = ?1", [record.id.as_str()])
        .unwrap();
    drop(conn);

    let err = store.get(&record.id, Visibility::IncludeDeleted).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ServerError);
}

#[test]
fn downgrade_drops_metadata_with_rows_present() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let (store, _clock) = store_with_secret(&dir, "S");
    store.create(new_metadata("S", "k", "v")).unwrap();
    drop(store);

    let target = SqliteSchemaTarget::open(&SqliteStoreConfig::new(&path)).unwrap();
    let executor = MigrationExecutor::new(
        Arc::new(builtin_registry().unwrap()),
        Arc::new(target.clone()),
        Arc::new(NoopAuditSink),
    );
    executor
        .downgrade_to(&RevisionTarget::Revision(secret_store_core::Revision::new(
            secret_store_sqlite::SECRETS_REVISION,
        )))
        .unwrap();
    assert!(!target.has_table("secret_store_metadata").unwrap());
    assert!(target.has_table("secrets").unwrap());
}

#[test]
fn scenario_key_reuse_after_soft_delete() {
    let dir = TempDir::new().unwrap();
    let (store, _clock) = store_with_secret(&dir, "S");
    let first = store.create(new_metadata("S", "cert_ref", "v1")).unwrap();
    let deleted = store.soft_delete(&first.id).unwrap();
    assert!(deleted.deleted && deleted.deleted_at.is_some());

    let second = store.create(new_metadata("S", "cert_ref", "v1")).unwrap();
    assert_ne!(second.id, first.id);
    assert!(!second.deleted);
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn active_keys_stay_unique_on_disk(ops in prop::collection::vec((0u8 .. 3, 0u8 .. 3, 0usize .. 6), 1 .. 20)) {
        let dir = TempDir::new().unwrap();
        let (store, clock) = store_with_secret(&dir, "S");
        let mut ids: Vec<MetadataId> = Vec::new();
        for (action, key, index) in ops {
            clock.advance(1);
            let key = format!("k{key}");
            match action {
                0 => {
                    if let Ok(record) = store.create(new_metadata("S", &key, "v")) {
                        ids.push(record.id);
                    }
                }
                1 => {
                    if let Some(id) = ids.get(index) {
                        let _ = store.update(id, &rename(&key));
                    }
                }
                _ => {
                    if let Some(id) = ids.get(index) {
                        store.soft_delete(id).unwrap();
                    }
                }
            }
        }
        let records = store.list(&SecretId::new("S"), Visibility::IncludeDeleted).unwrap();
        let mut active = BTreeSet::new();
        for record in &records {
            prop_assert_eq!(record.deleted, record.deleted_at.is_some());
            prop_assert!(record.updated_at >= record.created_at);
            if record.is_active() {
                prop_assert!(active.insert(record.key.clone()));
            }
        }
        let visible = store.list(&SecretId::new("S"), Visibility::ActiveOnly).unwrap();
        prop_assert!(visible.iter().all(SecretStoreMetadata::is_active));
    }
}
