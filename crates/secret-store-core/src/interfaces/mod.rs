// crates/secret-store-core/src/interfaces/mod.rs
// ============================================================================
// Module: Secret Store Interfaces
// Description: Backend-agnostic seams for schema migration and metadata CRUD.
// Purpose: Let the runtime depend on capabilities instead of a database handle.
// Dependencies: crate::core, crate::errors
// ============================================================================

//! ## Overview
//! Backends receive their store handle at construction and implement these
//! traits. The migration executor only sees a [`MigrationTarget`]; the
//! service layer only sees a [`SecretMetadataStore`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::MetadataId;
use crate::core::MetadataUpdate;
use crate::core::NewMetadata;
use crate::core::Revision;
use crate::core::SecretId;
use crate::core::SecretStoreMetadata;
use crate::core::TableDef;
use crate::core::Visibility;
use crate::errors::ServiceError;

// ============================================================================
// SECTION: Schema Introspection
// ============================================================================

/// Read-only view of the live schema.
pub trait SchemaIntrospector {
    /// Returns true when a table named `table` exists.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the schema cannot be inspected.
    fn table_exists(&mut self, table: &str) -> Result<bool, ServiceError>;
}

/// Mutable schema access inside one exclusive unit of work.
pub trait SchemaSession: SchemaIntrospector {
    /// Creates `table`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the backend rejects the definition.
    fn create_table(&mut self, table: &TableDef) -> Result<(), ServiceError>;

    /// Drops the table named `table`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the table does not exist or cannot be dropped.
    fn drop_table(&mut self, table: &str) -> Result<(), ServiceError>;

    /// Returns the revision the live schema reflects.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the applied state cannot be read.
    fn applied_revision(&mut self) -> Result<Option<Revision>, ServiceError>;

    /// Records the revision the live schema reflects; `None` means base.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the applied state cannot be written.
    fn set_applied_revision(&mut self, revision: Option<&Revision>) -> Result<(), ServiceError>;
}

/// Unit of work passed to [`MigrationTarget::with_exclusive_session`].
pub type SessionWork<'a> = dyn FnMut(&mut dyn SchemaSession) -> Result<(), ServiceError> + 'a;

/// Backing store that migrations run against.
pub trait MigrationTarget: Send + Sync {
    /// Runs `work` while holding exclusive schema access.
    ///
    /// Changes are committed when `work` returns `Ok` and discarded otherwise.
    ///
    /// # Errors
    ///
    /// Returns the error from `work`, or [`ServiceError`] when the lock or
    /// commit fails.
    fn with_exclusive_session(&self, work: &mut SessionWork<'_>) -> Result<(), ServiceError>;

    /// Returns the applied revision without taking the exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the applied state cannot be read.
    fn applied_revision(&self) -> Result<Option<Revision>, ServiceError>;
}

// ============================================================================
// SECTION: Metadata Store
// ============================================================================

/// CRUD over secret metadata records scoped by secret.
pub trait SecretMetadataStore: Send + Sync {
    /// Creates a record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::Duplicate`] when an active record with the
    /// same secret and key exists, [`crate::ErrorKind::NotFound`] when the
    /// secret does not exist, and validation errors for bad input.
    fn create(&self, input: NewMetadata) -> Result<SecretStoreMetadata, ServiceError>;

    /// Loads a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store fails.
    fn get(
        &self,
        id: &MetadataId,
        visibility: Visibility,
    ) -> Result<Option<SecretStoreMetadata>, ServiceError>;

    /// Lists a secret's records ordered by creation time, then id.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store fails.
    fn list(
        &self,
        secret_id: &SecretId,
        visibility: Visibility,
    ) -> Result<Vec<SecretStoreMetadata>, ServiceError>;

    /// Applies `update` to an active record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::NotFound`] when no active record matches and
    /// [`crate::ErrorKind::Duplicate`] when the new key clashes.
    fn update(
        &self,
        id: &MetadataId,
        update: &MetadataUpdate,
    ) -> Result<SecretStoreMetadata, ServiceError>;

    /// Soft-deletes a record; deleting a deleted record is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::NotFound`] when no record has this id.
    fn soft_delete(&self, id: &MetadataId) -> Result<SecretStoreMetadata, ServiceError>;
}
