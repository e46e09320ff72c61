// crates/secret-store-sqlite/src/migrations.rs
// ============================================================================
// Module: Built-In Migration Chain
// Description: Revisions that create the secrets and metadata tables.
// Purpose: Define the schema history every secret store database follows.
// Dependencies: secret-store-core
// ============================================================================

//! ## Overview
//! Two revisions, applied in order:
//! 1. [`SECRETS_REVISION`] creates the `secrets` parent table.
//! 2. [`METADATA_REVISION`] creates `secret_store_metadata`, keyed to
//!    `secrets(id)`.
//!
//! Both creations are guarded, so databases that already carry a table are
//! adopted rather than rejected. Downgrading the metadata revision drops the
//! table and every row in it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use secret_store_core::ColumnDef;
use secret_store_core::ColumnType;
use secret_store_core::ForeignKey;
use secret_store_core::MAX_ID_LENGTH;
use secret_store_core::MAX_KEY_LENGTH;
use secret_store_core::MAX_STATUS_LENGTH;
use secret_store_core::MAX_VALUE_LENGTH;
use secret_store_core::METADATA_SCHEMA;
use secret_store_core::MigrationStep;
use secret_store_core::SchemaRegistry;
use secret_store_core::ServiceError;
use secret_store_core::TableDef;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Root revision: the `secrets` parent table.
pub const SECRETS_REVISION: &str = "1a0c2cdafb38";
/// Head revision: the secret store metadata table.
pub const METADATA_REVISION: &str = "13d127569afa";
/// Parent table name.
pub const SECRETS_TABLE: &str = "secrets";
/// Maximum length of a secret name.
const MAX_SECRET_NAME_LENGTH: usize = 255;

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Columns shared by every soft-deletable table.
fn base_columns(table: TableDef) -> TableDef {
    table
        .column(ColumnDef::required("id", ColumnType::String(MAX_ID_LENGTH)))
        .column(ColumnDef::required("created_at", ColumnType::DateTime))
        .column(ColumnDef::required("updated_at", ColumnType::DateTime))
        .column(ColumnDef::nullable("deleted_at", ColumnType::DateTime))
        .column(ColumnDef::required("deleted", ColumnType::Boolean))
        .column(ColumnDef::required("status", ColumnType::String(MAX_STATUS_LENGTH)))
}

/// Definition of the `secrets` table.
#[must_use]
pub fn secrets_table() -> TableDef {
    base_columns(TableDef::new(SECRETS_TABLE))
        .column(ColumnDef::nullable("name", ColumnType::String(MAX_SECRET_NAME_LENGTH)))
        .primary_key(&["id"])
}

/// Definition of the `secret_store_metadata` table.
#[must_use]
pub fn metadata_table() -> TableDef {
    base_columns(TableDef::new(METADATA_SCHEMA))
        .column(ColumnDef::required("secret_id", ColumnType::String(MAX_ID_LENGTH)))
        .column(ColumnDef::required("key", ColumnType::String(MAX_KEY_LENGTH)))
        .column(ColumnDef::required("value", ColumnType::String(MAX_VALUE_LENGTH)))
        .primary_key(&["id"])
        .foreign_key(ForeignKey::new("secret_id", SECRETS_TABLE, "id"))
}

// ============================================================================
// SECTION: Chain
// ============================================================================

/// Returns the built-in migration steps.
#[must_use]
pub fn builtin_migrations() -> Vec<MigrationStep> {
    vec![
        MigrationStep::new(SECRETS_REVISION, None, "create_secrets_table")
            .creates_table(secrets_table()),
        MigrationStep::new(
            METADATA_REVISION,
            Some(SECRETS_REVISION),
            "create_secret_store_metadata_table",
        )
        .creates_table(metadata_table()),
    ]
}

/// Loads the built-in chain into a registry.
///
/// # Errors
///
/// Returns [`secret_store_core::ErrorKind::SchemaLoadError`] if the chain is
/// malformed.
pub fn builtin_registry() -> Result<SchemaRegistry, ServiceError> {
    SchemaRegistry::load(builtin_migrations())
}
