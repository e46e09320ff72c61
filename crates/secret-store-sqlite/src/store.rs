// crates/secret-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Metadata Store
// Description: Durable SecretMetadataStore backed by SQLite.
// Purpose: Persist secret metadata with soft-delete and per-secret key rules.
// Dependencies: rusqlite, secret-store-core
// ============================================================================

//! ## Overview
//! [`SqliteMetadataStore`] implements [`SecretMetadataStore`] over the
//! `secret_store_metadata` table. Every operation runs in its own
//! transaction; writes use `BEGIN IMMEDIATE` so the uniqueness check and the
//! write it guards see the same snapshot. The store only opens against a
//! schema at head, upgrading first when asked to.
//!
//! Metadata values are stored verbatim and never copied into errors or audit
//! events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use secret_store_core::AuditSink;
use secret_store_core::Clock;
use secret_store_core::ErrorKind;
use secret_store_core::MetadataAuditEvent;
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
use secret_store_core::ServiceError;
use secret_store_core::SystemClock;
use secret_store_core::Timestamp;
use secret_store_core::Visibility;
use secret_store_core::write_time;

use crate::connection::SqliteStoreConfig;
use crate::connection::is_constraint_violation;
use crate::connection::map_db_error;
use crate::migrations::builtin_registry;
use crate::schema::SqliteSchemaTarget;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Column list shared by every metadata query.
const METADATA_COLUMNS: &str =
    "id, secret_id, \"key\", value, status, created_at, updated_at, deleted_at, deleted";

// ============================================================================
// SECTION: Options
// ============================================================================

/// Schema handling when opening a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    /// Upgrade to head before serving requests.
    #[default]
    AutoUpgrade,
    /// Refuse to open unless the schema is already at head.
    RequireHead,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed metadata store.
///
/// # Invariants
/// - The schema was at head when the store was opened.
/// - `SQLite` connection access is serialized through a mutex.
pub struct SqliteMetadataStore {
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
    /// Time source for writes.
    clock: Arc<dyn Clock>,
    /// Audit sink for writes.
    audit: Arc<dyn AuditSink>,
}

impl SqliteMetadataStore {
    /// Opens the store, applying `policy` to the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::DatabaseMigrationError`] when the schema is not at
    /// head and cannot or may not be upgraded, or [`ServiceError`] when the
    /// database cannot be opened.
    pub fn open(
        config: &SqliteStoreConfig,
        policy: SchemaPolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ServiceError> {
        let target = SqliteSchemaTarget::open(config)?;
        let executor = MigrationExecutor::new(
            Arc::new(builtin_registry()?),
            Arc::new(target.clone()),
            Arc::clone(&audit),
        );
        match policy {
            SchemaPolicy::AutoUpgrade => {
                executor.upgrade_to(&RevisionTarget::Head)?;
            }
            SchemaPolicy::RequireHead => {
                if !executor.is_at_head()? {
                    let current = executor
                        .current()?
                        .map_or_else(|| "base".to_string(), |revision| revision.to_string());
                    return Err(ServiceError::migration(format!(
                        "schema is at {current}, not head; run `secret-store migrate upgrade`"
                    )));
                }
            }
        }
        Ok(Self {
            connection: target.connection(),
            clock: Arc::new(SystemClock),
            audit,
        })
    }

    /// Opens the store with no audit output.
    ///
    /// # Errors
    ///
    /// See [`SqliteMetadataStore::open`].
    pub fn open_default(config: &SqliteStoreConfig) -> Result<Self, ServiceError> {
        Self::open(config, SchemaPolicy::AutoUpgrade, Arc::new(NoopAuditSink))
    }

    /// Replaces the time source for writes.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Inserts a parent secret row.
    ///
    /// Secrets are owned elsewhere; this gives tools and tests a way to
    /// satisfy the foreign key.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Duplicate`] when the secret already exists.
    pub fn insert_secret(&self, secret_id: &SecretId, name: Option<&str>) -> Result<(), ServiceError> {
        let now = self.clock.now().as_unix_millis();
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO secrets (id, created_at, updated_at, deleted_at, deleted, status, \
                 name) VALUES (?1, ?2, ?2, NULL, 0, ?3, ?4)",
                params![secret_id.as_str(), now, MetadataStatus::ACTIVE, name],
            )
            .map_err(|err| {
                if is_constraint_violation(&err) {
                    ServiceError::duplicate()
                } else {
                    map_db_error(&err)
                }
            })?;
        Ok(())
    }

    /// Deletes a parent secret row that no metadata references.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NotFound`] for unknown secrets and
    /// [`ErrorKind::InUseByStore`] when metadata still references it.
    pub fn remove_secret(&self, secret_id: &SecretId) -> Result<(), ServiceError> {
        let guard = self.lock()?;
        let removed = guard
            .execute("DELETE FROM secrets WHERE id = ?1", params![secret_id.as_str()])
            .map_err(|err| {
                if is_constraint_violation(&err) {
                    ServiceError::new(ErrorKind::InUseByStore)
                } else {
                    map_db_error(&err)
                }
            })?;
        if removed == 0 {
            return Err(ServiceError::not_found());
        }
        Ok(())
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ServiceError> {
        self.connection.lock().map_err(|_| ServiceError::server("sqlite connection mutex poisoned"))
    }

    /// Runs `work` in an immediate transaction, committing on success.
    fn write<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| map_db_error(&err))?;
        let value = work(&tx)?;
        tx.commit().map_err(|err| map_db_error(&err))?;
        Ok(value)
    }
}

impl SecretMetadataStore for SqliteMetadataStore {
    fn create(&self, input: NewMetadata) -> Result<SecretStoreMetadata, ServiceError> {
        input.validate()?;
        let record = self.write(|tx| {
            if !secret_exists(tx, &input.secret_id)? {
                return Err(secret_not_found(&input.secret_id));
            }
            if key_taken(tx, &input.secret_id, &input.key, None)? {
                return Err(ServiceError::duplicate());
            }
            let record = input.clone().into_record(MetadataId::generate(), self.clock.now());
            insert_record(tx, &record).map_err(|err| {
                if is_constraint_violation(&err) {
                    secret_not_found(&record.secret_id)
                } else {
                    map_db_error(&err)
                }
            })?;
            Ok(record)
        })?;
        self.audit.record_metadata(&MetadataAuditEvent::created(&record));
        Ok(record)
    }

    fn get(
        &self,
        id: &MetadataId,
        visibility: Visibility,
    ) -> Result<Option<SecretStoreMetadata>, ServiceError> {
        let guard = self.lock()?;
        let record = fetch_record(&guard, id)?;
        Ok(record.filter(|record| visibility.admits(record)))
    }

    fn list(
        &self,
        secret_id: &SecretId,
        visibility: Visibility,
    ) -> Result<Vec<SecretStoreMetadata>, ServiceError> {
        let guard = self.lock()?;
        let filter = match visibility {
            Visibility::ActiveOnly => " AND deleted = 0",
            Visibility::IncludeDeleted => "",
        };
        let mut stmt = guard
            .prepare(&format!(
                "SELECT {METADATA_COLUMNS} FROM secret_store_metadata WHERE secret_id = ?1{filter} \
                 ORDER BY created_at, id"
            ))
            .map_err(|err| map_db_error(&err))?;
        let rows = stmt
            .query_map(params![secret_id.as_str()], map_metadata_row)
            .map_err(|err| map_db_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| map_db_error(&err))?;
        rows.into_iter().map(MetadataRow::into_record).collect()
    }

    fn update(
        &self,
        id: &MetadataId,
        update: &MetadataUpdate,
    ) -> Result<SecretStoreMetadata, ServiceError> {
        update.validate()?;
        if update.is_empty() {
            return Err(ServiceError::new(ErrorKind::NoDataToProcess));
        }
        let record = self.write(|tx| {
            let Some(mut record) = fetch_record(tx, id)?.filter(SecretStoreMetadata::is_active)
            else {
                return Err(ServiceError::not_found());
            };
            if let Some(key) = &update.key
                && key_taken(tx, &record.secret_id, key, Some(id))?
            {
                return Err(ServiceError::duplicate());
            }
            let now = write_time(self.clock.as_ref(), record.created_at);
            update.apply(&mut record, now);
            tx.execute(
                "UPDATE secret_store_metadata SET \"key\" = ?2, value = ?3, status = ?4, \
                 updated_at = ?5 WHERE id = ?1",
                params![
                    record.id.as_str(),
                    record.key,
                    record.value,
                    record.status.as_str(),
                    record.updated_at.as_unix_millis(),
                ],
            )
            .map_err(|err| map_db_error(&err))?;
            Ok(record)
        })?;
        self.audit.record_metadata(&MetadataAuditEvent::updated(&record));
        Ok(record)
    }

    fn soft_delete(&self, id: &MetadataId) -> Result<SecretStoreMetadata, ServiceError> {
        let (record, changed) = self.write(|tx| {
            let Some(mut record) = fetch_record(tx, id)? else {
                return Err(ServiceError::not_found());
            };
            if record.deleted {
                return Ok((record, false));
            }
            record.mark_deleted(write_time(self.clock.as_ref(), record.created_at));
            tx.execute(
                "UPDATE secret_store_metadata SET deleted = 1, deleted_at = ?2, updated_at = ?3 \
                 WHERE id = ?1",
                params![
                    record.id.as_str(),
                    record.deleted_at.map(Timestamp::as_unix_millis),
                    record.updated_at.as_unix_millis(),
                ],
            )
            .map_err(|err| map_db_error(&err))?;
            Ok((record, true))
        })?;
        if changed {
            self.audit.record_metadata(&MetadataAuditEvent::soft_deleted(&record));
        }
        Ok(record)
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Raw metadata row before validation.
struct MetadataRow {
    /// Record identifier.
    id: String,
    /// Owning secret.
    secret_id: String,
    /// Attribute key.
    key: String,
    /// Attribute value.
    value: String,
    /// Lifecycle label.
    status: String,
    /// Creation time (unix millis).
    created_at: i64,
    /// Last write time (unix millis).
    updated_at: i64,
    /// Soft-delete time (unix millis).
    deleted_at: Option<i64>,
    /// Soft-delete flag.
    deleted: bool,
}

impl MetadataRow {
    /// Converts the row into a record, rejecting rows that break invariants.
    fn into_record(self) -> Result<SecretStoreMetadata, ServiceError> {
        if self.deleted != self.deleted_at.is_some() {
            return Err(ServiceError::server(&format!(
                "metadata row {} has inconsistent soft-delete columns",
                self.id
            )));
        }
        let status = MetadataStatus::new(self.status).map_err(|_| {
            ServiceError::server(&format!("metadata row {} has an invalid status", self.id))
        })?;
        Ok(SecretStoreMetadata {
            id: MetadataId::new(self.id),
            secret_id: SecretId::new(self.secret_id),
            key: self.key,
            value: self.value,
            status,
            created_at: Timestamp::from_unix_millis(self.created_at),
            updated_at: Timestamp::from_unix_millis(self.updated_at),
            deleted_at: self.deleted_at.map(Timestamp::from_unix_millis),
            deleted: self.deleted,
        })
    }
}

/// Maps a row selected with [`METADATA_COLUMNS`].
fn map_metadata_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetadataRow> {
    Ok(MetadataRow {
        id: row.get(0)?,
        secret_id: row.get(1)?,
        key: row.get(2)?,
        value: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        deleted_at: row.get(7)?,
        deleted: row.get(8)?,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads a record by id regardless of visibility.
fn fetch_record(
    connection: &Connection,
    id: &MetadataId,
) -> Result<Option<SecretStoreMetadata>, ServiceError> {
    connection
        .query_row(
            &format!("SELECT {METADATA_COLUMNS} FROM secret_store_metadata WHERE id = ?1"),
            params![id.as_str()],
            map_metadata_row,
        )
        .optional()
        .map_err(|err| map_db_error(&err))?
        .map(MetadataRow::into_record)
        .transpose()
}

/// Returns true when the parent secret exists.
fn secret_exists(connection: &Connection, secret_id: &SecretId) -> Result<bool, ServiceError> {
    connection
        .query_row("SELECT 1 FROM secrets WHERE id = ?1", params![secret_id.as_str()], |_| Ok(()))
        .optional()
        .map(|row| row.is_some())
        .map_err(|err| map_db_error(&err))
}

/// Returns true when an active record other than `except` uses `key` on `secret_id`.
fn key_taken(
    connection: &Connection,
    secret_id: &SecretId,
    key: &str,
    except: Option<&MetadataId>,
) -> Result<bool, ServiceError> {
    connection
        .query_row(
            "SELECT 1 FROM secret_store_metadata WHERE secret_id = ?1 AND \"key\" = ?2 AND \
             deleted = 0 AND (?3 IS NULL OR id != ?3) LIMIT 1",
            params![secret_id.as_str(), key, except.map(MetadataId::as_str)],
            |_| Ok(()),
        )
        .optional()
        .map(|row| row.is_some())
        .map_err(|err| map_db_error(&err))
}

/// Inserts a new record row.
fn insert_record(connection: &Connection, record: &SecretStoreMetadata) -> rusqlite::Result<usize> {
    connection.execute(
        &format!(
            "INSERT INTO secret_store_metadata ({METADATA_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, \
             ?6, ?7, ?8, ?9)"
        ),
        params![
            record.id.as_str(),
            record.secret_id.as_str(),
            record.key,
            record.value,
            record.status.as_str(),
            record.created_at.as_unix_millis(),
            record.updated_at.as_unix_millis(),
            record.deleted_at.map(Timestamp::as_unix_millis),
            record.deleted,
        ],
    )
}

/// Builds the not-found error for a missing parent secret.
fn secret_not_found(secret_id: &SecretId) -> ServiceError {
    ServiceError::secret_not_found(secret_id.as_str())
}
