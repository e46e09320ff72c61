// crates/secret-store-sqlite/src/lib.rs
// ============================================================================
// Module: Secret Store SQLite Library
// Description: SQLite migration target and metadata store.
// Purpose: Provide the durable backend for secret store metadata.
// Dependencies: crate::{connection, migrations, schema, store}
// ============================================================================

//! ## Overview
//! This crate binds the secret store core to `SQLite`. It ships the built-in
//! migration chain, a [`SqliteSchemaTarget`] that applies that chain as DDL
//! inside immediate transactions, and a [`SqliteMetadataStore`] that serves
//! metadata reads and writes once the schema is at head.
//! Invariants:
//! - Foreign keys are enforced on every connection.
//! - A store never serves requests against a schema behind head.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod connection;
pub mod migrations;
pub mod schema;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use connection::DEFAULT_BUSY_TIMEOUT_MS;
pub use connection::SqliteJournalMode;
pub use connection::SqliteStoreConfig;
pub use connection::SqliteStoreError;
pub use connection::SqliteSyncMode;
pub use connection::open_connection;
pub use migrations::METADATA_REVISION;
pub use migrations::SECRETS_REVISION;
pub use migrations::SECRETS_TABLE;
pub use migrations::builtin_migrations;
pub use migrations::builtin_registry;
pub use migrations::metadata_table;
pub use migrations::secrets_table;
pub use schema::SqliteSchemaTarget;
pub use schema::VERSION_TABLE;
pub use schema::render_create_table;
pub use store::SchemaPolicy;
pub use store::SqliteMetadataStore;
