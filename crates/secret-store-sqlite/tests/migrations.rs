// crates/secret-store-sqlite/tests/migrations.rs
// ============================================================================
// Module: SQLite Migration Tests
// Description: Built-in chain applied to real SQLite files.
// Purpose: Validate idempotent upgrades, downgrades, adoption, and rollback.
// ============================================================================

//! ## Overview
//! Runs the built-in chain against temporary `SQLite` databases:
//! - Upgrading twice creates nothing the second time.
//! - Pre-existing tables are adopted rather than recreated.
//! - A failing step leaves no partial tables and keeps the revision.
//! - Two connections racing on one file apply each step once.
//! - An executor waiting on another connection's write re-reads its revision.

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

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rusqlite::Connection;
use secret_store_core::ColumnDef;
use secret_store_core::ColumnType;
use secret_store_core::ErrorKind;
use secret_store_core::MigrationExecutor;
use secret_store_core::NoopAuditSink;
use secret_store_core::Revision;
use secret_store_core::RevisionTarget;
use secret_store_core::SchemaOp;
use secret_store_core::SchemaRegistry;
use secret_store_core::TableDef;
use secret_store_sqlite::METADATA_REVISION;
use secret_store_sqlite::SECRETS_REVISION;
use secret_store_sqlite::SECRETS_TABLE;
use secret_store_sqlite::SqliteSchemaTarget;
use secret_store_sqlite::SqliteStoreConfig;
use secret_store_sqlite::VERSION_TABLE;
use secret_store_sqlite::builtin_migrations;
use secret_store_sqlite::builtin_registry;
use secret_store_sqlite::metadata_table;
use secret_store_sqlite::render_create_table;
use secret_store_sqlite::secrets_table;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const METADATA_TABLE: &str = "secret_store_metadata";

fn target(path: &Path) -> SqliteSchemaTarget {
    SqliteSchemaTarget::open(&SqliteStoreConfig::new(path)).unwrap()
}

fn executor_with(registry: SchemaRegistry, target: &SqliteSchemaTarget) -> MigrationExecutor {
    MigrationExecutor::new(Arc::new(registry), Arc::new(target.clone()), Arc::new(NoopAuditSink))
}

fn executor(target: &SqliteSchemaTarget) -> MigrationExecutor {
    executor_with(builtin_registry().unwrap(), target)
}

fn created_count(report: &secret_store_core::MigrationReport) -> usize {
    report.applied.iter().map(|step| step.outcome.created.len()).sum()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn upgrade_creates_both_tables_and_records_head() {
    let dir = TempDir::new().unwrap();
    let target = target(&dir.path().join("store.db"));
    let executor = executor(&target);

    assert_eq!(executor.current().unwrap(), None);
    let report = executor.upgrade_to(&RevisionTarget::Head).unwrap();
    assert_eq!(created_count(&report), 2);
    assert_eq!(report.to, Some(Revision::new(METADATA_REVISION)));
    assert!(target.has_table(SECRETS_TABLE).unwrap());
    assert!(target.has_table(METADATA_TABLE).unwrap());
    assert!(target.has_table(VERSION_TABLE).unwrap());
    assert!(executor.is_at_head().unwrap());
}

#[test]
fn second_upgrade_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    executor(&target(&path)).upgrade_to(&RevisionTarget::Head).unwrap();

    let report = executor(&target(&path)).upgrade_to(&RevisionTarget::Head).unwrap();
    assert!(report.is_noop());
    assert_eq!(created_count(&report), 0);
}

#[test]
fn existing_metadata_table_is_adopted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let target = target(&path);
    let executor = executor(&target);
    executor.upgrade_to(&RevisionTarget::Head).unwrap();

    // Forget the revision but keep the tables.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(&format!("DELETE FROM {VERSION_TABLE};")).unwrap();
    drop(conn);
    assert_eq!(executor.current().unwrap(), None);

    let report = executor.upgrade_to(&RevisionTarget::Head).unwrap();
    assert_eq!(report.applied.len(), 2);
    assert_eq!(created_count(&report), 0);
    assert_eq!(report.applied[1].outcome.skipped, vec![METADATA_TABLE.to_string()]);
    assert!(executor.is_at_head().unwrap());
}

#[test]
fn upgrade_to_root_then_head() {
    let dir = TempDir::new().unwrap();
    let target = target(&dir.path().join("store.db"));
    let executor = executor(&target);

    let target_rev = RevisionTarget::Revision(Revision::new(SECRETS_REVISION));
    let report = executor.upgrade_to(&target_rev).unwrap();
    assert_eq!(report.applied.len(), 1);
    assert!(target.has_table(SECRETS_TABLE).unwrap());
    assert!(!target.has_table(METADATA_TABLE).unwrap());
    assert!(!executor.is_at_head().unwrap());

    let history = executor.history().unwrap();
    assert!(history[0].applied && history[0].current);
    assert!(!history[1].applied && history[1].head);

    executor.upgrade_to(&RevisionTarget::Head).unwrap();
    assert!(target.has_table(METADATA_TABLE).unwrap());
}

#[test]
fn downgrade_to_base_drops_tables_in_reverse() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let target = target(&path);
    let executor = executor(&target);
    executor.upgrade_to(&RevisionTarget::Head).unwrap();

    let report = executor.downgrade_to(&RevisionTarget::Base).unwrap();
    let dropped: Vec<String> =
        report.applied.iter().flat_map(|step| step.outcome.dropped.clone()).collect();
    assert_eq!(dropped, vec![METADATA_TABLE.to_string(), SECRETS_TABLE.to_string()]);
    assert!(!target.has_table(SECRETS_TABLE).unwrap());
    assert_eq!(executor.current().unwrap(), None);

    let report = executor.upgrade_to(&RevisionTarget::Head).unwrap();
    assert_eq!(created_count(&report), 2);
}

#[test]
fn downgrade_when_table_already_gone_fails_and_keeps_revision() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let target = target(&path);
    let executor = executor(&target);
    executor.upgrade_to(&RevisionTarget::Head).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(&format!("DROP TABLE {METADATA_TABLE};")).unwrap();
    drop(conn);

    let err = executor.downgrade_to(&RevisionTarget::Base).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DatabaseMigrationError { .. }));
    assert!(err.message().contains(METADATA_REVISION));
    assert_eq!(executor.current().unwrap(), Some(Revision::new(METADATA_REVISION)));
    assert!(target.has_table(SECRETS_TABLE).unwrap());
}

#[test]
fn failing_step_rolls_back_its_own_changes() {
    let dir = TempDir::new().unwrap();
    let target = target(&dir.path().join("store.db"));
    let mut steps = builtin_migrations();
    steps.push(
        secret_store_core::MigrationStep::new("5f1e0d2c9b7a", Some(METADATA_REVISION), "broken")
            .creates_table(
                TableDef::new("half_done")
                    .column(ColumnDef::required("id", ColumnType::String(36))),
            )
            .on_upgrade(SchemaOp::DropTable {
                name: "never_created".to_string(),
            }),
    );
    let executor = executor_with(SchemaRegistry::load(steps).unwrap(), &target);

    let err = executor.upgrade_to(&RevisionTarget::Head).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DatabaseMigrationError { .. }));
    assert!(err.message().contains("5f1e0d2c9b7a"));
    assert!(!target.has_table("half_done").unwrap());
    assert!(target.has_table(METADATA_TABLE).unwrap());
    assert_eq!(executor.current().unwrap(), Some(Revision::new(METADATA_REVISION)));
}

#[test]
fn racing_connections_apply_each_step_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let targets: Vec<SqliteSchemaTarget> = (0 .. 3).map(|_| target(&path)).collect();

    let handles: Vec<_> = targets
        .iter()
        .map(|target| {
            let executor = executor(target);
            thread::spawn(move || executor.upgrade_to(&RevisionTarget::Head).unwrap())
        })
        .collect();
    let created: usize = handles.into_iter().map(|handle| created_count(&handle.join().unwrap())).sum();

    assert_eq!(created, 2);
    assert!(executor(&targets[0]).is_at_head().unwrap());
}

#[test]
fn executor_waiting_on_busy_lock_sees_committed_head() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let executor = executor(&target(&path));

    let holder = Connection::open(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();
    holder.execute_batch(&render_create_table(&secrets_table()).unwrap()).unwrap();
    holder.execute_batch(&render_create_table(&metadata_table()).unwrap()).unwrap();
    holder
        .execute_batch(&format!(
            "CREATE TABLE {VERSION_TABLE} (version_num VARCHAR(32) NOT NULL);
             INSERT INTO {VERSION_TABLE} (version_num) VALUES ('{METADATA_REVISION}');"
        ))
        .unwrap();

    let (started, ready) = mpsc::channel();
    let handle = thread::spawn(move || {
        started.send(()).unwrap();
        executor.upgrade_to(&RevisionTarget::Head)
    });
    ready.recv().unwrap();
    thread::sleep(Duration::from_millis(200));
    holder.execute_batch("COMMIT;").unwrap();

    let report = handle.join().unwrap().unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.to, Some(Revision::new(METADATA_REVISION)));
    let reader = target(&path);
    assert!(reader.has_table(SECRETS_TABLE).unwrap());
    assert!(reader.has_table(METADATA_TABLE).unwrap());
}

#[test]
fn unknown_applied_revision_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let target = target(&path);
    let executor = executor(&target);
    executor.upgrade_to(&RevisionTarget::Head).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(&format!("UPDATE {VERSION_TABLE} SET version_num = 'ffffffffffff';"))
        .unwrap();
    drop(conn);

    let err = executor.upgrade_to(&RevisionTarget::Head).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DatabaseMigrationError { .. }));
}

#[test]
fn rendered_secrets_ddl_is_valid_sqlite() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&render_create_table(&secrets_table()).unwrap()).unwrap();
    conn.execute(
        "INSERT INTO secrets (id, created_at, updated_at, deleted, status) VALUES ('s', 1, 1, 0, \
         'active')",
        [],
    )
    .unwrap();
    let name: Option<String> =
        conn.query_row("SELECT name FROM secrets WHERE id = 's'", [], |row| row.get(0)).unwrap();
    assert_eq!(name, None);
}
