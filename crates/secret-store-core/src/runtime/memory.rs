// crates/secret-store-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Secret Store Backends
// Description: Mutex-guarded schema target and metadata store for tests.
// Purpose: Exercise the migration executor and store contract without SQLite.
// Dependencies: crate::audit, crate::core, crate::errors, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemorySchema`] is a [`MigrationTarget`] that keeps a set of table
//! definitions plus the applied revision. Sessions work on a copy of that
//! state and only publish it when the unit of work succeeds, which mirrors
//! transactional DDL. [`InMemoryMetadataStore`] implements the metadata store
//! contract over a map and a set of known secrets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::audit::AuditSink;
use crate::audit::MetadataAuditEvent;
use crate::audit::NoopAuditSink;
use crate::core::Clock;
use crate::core::MetadataId;
use crate::core::MetadataUpdate;
use crate::core::NewMetadata;
use crate::core::Revision;
use crate::core::SecretId;
use crate::core::SecretStoreMetadata;
use crate::core::SystemClock;
use crate::core::TableDef;
use crate::core::Visibility;
use crate::core::write_time;
use crate::errors::ErrorKind;
use crate::errors::ServiceError;
use crate::interfaces::MigrationTarget;
use crate::interfaces::SchemaIntrospector;
use crate::interfaces::SchemaSession;
use crate::interfaces::SecretMetadataStore;
use crate::interfaces::SessionWork;

// ============================================================================
// SECTION: Schema Target
// ============================================================================

/// Schema state published by [`InMemorySchema`].
#[derive(Debug, Clone, Default)]
struct SchemaState {
    /// Tables by name.
    tables: BTreeMap<String, TableDef>,
    /// Applied revision.
    revision: Option<Revision>,
    /// Table names whose creation should fail.
    failing_creates: BTreeSet<String>,
}

impl SchemaIntrospector for SchemaState {
    fn table_exists(&mut self, table: &str) -> Result<bool, ServiceError> {
        Ok(self.tables.contains_key(table))
    }
}

impl SchemaSession for SchemaState {
    fn create_table(&mut self, table: &TableDef) -> Result<(), ServiceError> {
        if self.failing_creates.contains(&table.name) {
            return Err(ServiceError::server(&format!("create table {} rejected", table.name)));
        }
        if self.tables.contains_key(&table.name) {
            return Err(ServiceError::server(&format!("table {} already exists", table.name)));
        }
        self.tables.insert(table.name.clone(), table.clone());
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> Result<(), ServiceError> {
        if self.tables.remove(table).is_none() {
            return Err(ServiceError::server(&format!("no such table: {table}")));
        }
        Ok(())
    }

    fn applied_revision(&mut self) -> Result<Option<Revision>, ServiceError> {
        Ok(self.revision.clone())
    }

    fn set_applied_revision(&mut self, revision: Option<&Revision>) -> Result<(), ServiceError> {
        self.revision = revision.cloned();
        Ok(())
    }
}

/// In-memory migration target.
#[derive(Debug, Default)]
pub struct InMemorySchema {
    /// Committed schema state.
    state: Mutex<SchemaState>,
}

impl InMemorySchema {
    /// Creates an empty schema at base.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table outside of any migration, as a pre-existing schema would.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the state lock is poisoned.
    pub fn seed_table(&self, table: TableDef) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Makes every later creation of `table` fail.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the state lock is poisoned.
    pub fn fail_creates_of(&self, table: &str) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.failing_creates.insert(table.to_string());
        Ok(())
    }

    /// Returns the committed table names.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the state lock is poisoned.
    pub fn table_names(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.lock()?.tables.keys().cloned().collect())
    }

    /// Locks the committed state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SchemaState>, ServiceError> {
        self.state.lock().map_err(|_| ServiceError::server("schema state lock poisoned"))
    }
}

impl MigrationTarget for InMemorySchema {
    fn with_exclusive_session(&self, work: &mut SessionWork<'_>) -> Result<(), ServiceError> {
        let mut committed = self.lock()?;
        let mut working = committed.clone();
        work(&mut working)?;
        *committed = working;
        Ok(())
    }

    fn applied_revision(&self) -> Result<Option<Revision>, ServiceError> {
        Ok(self.lock()?.revision.clone())
    }
}

// ============================================================================
// SECTION: Metadata Store
// ============================================================================

/// Records and known secrets.
#[derive(Debug, Default)]
struct MetadataState {
    /// Secrets that records may reference.
    secrets: BTreeSet<SecretId>,
    /// Records by id.
    records: BTreeMap<MetadataId, SecretStoreMetadata>,
}

impl MetadataState {
    /// Returns true when an active record other than `except` uses `key` on `secret_id`.
    fn key_taken(&self, secret_id: &SecretId, key: &str, except: Option<&MetadataId>) -> bool {
        self.records.values().any(|record| {
            record.is_active()
                && &record.secret_id == secret_id
                && record.key == key
                && Some(&record.id) != except
        })
    }
}

/// In-memory metadata store.
pub struct InMemoryMetadataStore {
    /// Guarded store state.
    state: Mutex<MetadataState>,
    /// Time source for writes.
    clock: Arc<dyn Clock>,
    /// Audit sink for writes.
    audit: Arc<dyn AuditSink>,
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMetadataStore {
    /// Creates an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store using `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MetadataState::default()),
            clock,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Routes write events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Registers a secret that records may reference.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the state lock is poisoned.
    pub fn register_secret(&self, secret_id: SecretId) -> Result<(), ServiceError> {
        self.lock()?.secrets.insert(secret_id);
        Ok(())
    }

    /// Removes a secret that no record references.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::NotFound`] for unknown secrets and
    /// [`crate::ErrorKind::InUseByStore`] when records still reference it.
    pub fn remove_secret(&self, secret_id: &SecretId) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if !state.secrets.contains(secret_id) {
            return Err(ServiceError::not_found());
        }
        if state.records.values().any(|record| &record.secret_id == secret_id) {
            return Err(ServiceError::new(ErrorKind::InUseByStore));
        }
        state.secrets.remove(secret_id);
        Ok(())
    }

    /// Locks the store state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MetadataState>, ServiceError> {
        self.state.lock().map_err(|_| ServiceError::server("metadata store lock poisoned"))
    }
}

impl SecretMetadataStore for InMemoryMetadataStore {
    fn create(&self, input: NewMetadata) -> Result<SecretStoreMetadata, ServiceError> {
        input.validate()?;
        let mut state = self.lock()?;
        if !state.secrets.contains(&input.secret_id) {
            return Err(ServiceError::secret_not_found(input.secret_id.as_str()));
        }
        if state.key_taken(&input.secret_id, &input.key, None) {
            return Err(ServiceError::duplicate());
        }
        let record = input.into_record(MetadataId::generate(), self.clock.now());
        state.records.insert(record.id.clone(), record.clone());
        drop(state);
        self.audit.record_metadata(&MetadataAuditEvent::created(&record));
        Ok(record)
    }

    fn get(
        &self,
        id: &MetadataId,
        visibility: Visibility,
    ) -> Result<Option<SecretStoreMetadata>, ServiceError> {
        let state = self.lock()?;
        Ok(state.records.get(id).filter(|record| visibility.admits(record)).cloned())
    }

    fn list(
        &self,
        secret_id: &SecretId,
        visibility: Visibility,
    ) -> Result<Vec<SecretStoreMetadata>, ServiceError> {
        let state = self.lock()?;
        let mut records: Vec<SecretStoreMetadata> = state
            .records
            .values()
            .filter(|record| &record.secret_id == secret_id && visibility.admits(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
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
        let mut state = self.lock()?;
        let Some(existing) = state.records.get(id).filter(|record| record.is_active()) else {
            return Err(ServiceError::not_found());
        };
        if let Some(key) = &update.key
            && state.key_taken(&existing.secret_id, key, Some(id))
        {
            return Err(ServiceError::duplicate());
        }
        let mut record = existing.clone();
        let now = write_time(self.clock.as_ref(), record.created_at);
        update.apply(&mut record, now);
        state.records.insert(id.clone(), record.clone());
        drop(state);
        self.audit.record_metadata(&MetadataAuditEvent::updated(&record));
        Ok(record)
    }

    fn soft_delete(&self, id: &MetadataId) -> Result<SecretStoreMetadata, ServiceError> {
        let mut state = self.lock()?;
        let Some(record) = state.records.get_mut(id) else {
            return Err(ServiceError::not_found());
        };
        if record.deleted {
            return Ok(record.clone());
        }
        let now = write_time(self.clock.as_ref(), record.created_at);
        record.mark_deleted(now);
        let record = record.clone();
        drop(state);
        self.audit.record_metadata(&MetadataAuditEvent::soft_deleted(&record));
        Ok(record)
    }
}
