// crates/secret-store-sqlite/src/schema.rs
// ============================================================================
// Module: SQLite Schema Target
// Description: Migration target that applies schema ops as SQLite DDL.
// Purpose: Run migration steps inside immediate transactions with a version row.
// Dependencies: rusqlite, secret-store-core
// ============================================================================

//! ## Overview
//! [`SqliteSchemaTarget`] implements [`MigrationTarget`]. Each exclusive
//! session is a `BEGIN IMMEDIATE` transaction, so a second process trying to
//! migrate the same file waits on the busy timeout and then re-reads the
//! applied revision. `SQLite` DDL is transactional; a failed step leaves no
//! partial tables behind.
//!
//! The applied revision lives in a one-row `schema_version(version_num)`
//! table. A database without that table is at base.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use secret_store_core::ColumnDef;
use secret_store_core::ColumnType;
use secret_store_core::MigrationTarget;
use secret_store_core::Revision;
use secret_store_core::SchemaIntrospector;
use secret_store_core::SchemaSession;
use secret_store_core::ServiceError;
use secret_store_core::SessionWork;
use secret_store_core::TableDef;

use crate::connection::SqliteStoreConfig;
use crate::connection::map_db_error;
use crate::connection::open_connection;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Table holding the applied revision.
pub const VERSION_TABLE: &str = "schema_version";

// ============================================================================
// SECTION: Target
// ============================================================================

/// `SQLite` database as a migration target.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - `schema_version` holds at most one row.
#[derive(Clone)]
pub struct SqliteSchemaTarget {
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSchemaTarget {
    /// Opens the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the database cannot be opened.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, ServiceError> {
        let connection = open_connection(config)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(connection))))
    }

    /// Wraps an already configured connection.
    #[must_use]
    pub const fn from_connection(connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            connection,
        }
    }

    /// Returns the shared connection.
    #[must_use]
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.connection)
    }

    /// Returns true when `table` exists.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the schema cannot be inspected.
    pub fn has_table(&self, table: &str) -> Result<bool, ServiceError> {
        let guard = self.lock()?;
        table_exists(&guard, table)
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ServiceError> {
        self.connection.lock().map_err(|_| ServiceError::server("sqlite connection mutex poisoned"))
    }
}

impl MigrationTarget for SqliteSchemaTarget {
    fn with_exclusive_session(&self, work: &mut SessionWork<'_>) -> Result<(), ServiceError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| map_db_error(&err))?;
        let mut session = SqliteSession {
            connection: &tx,
        };
        work(&mut session)?;
        tx.commit().map_err(|err| map_db_error(&err))
    }

    fn applied_revision(&self) -> Result<Option<Revision>, ServiceError> {
        let guard = self.lock()?;
        read_revision(&guard)
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Schema session bound to an open immediate transaction.
struct SqliteSession<'a> {
    /// Transaction connection.
    connection: &'a Connection,
}

impl SchemaIntrospector for SqliteSession<'_> {
    fn table_exists(&mut self, table: &str) -> Result<bool, ServiceError> {
        table_exists(self.connection, table)
    }
}

impl SchemaSession for SqliteSession<'_> {
    fn create_table(&mut self, table: &TableDef) -> Result<(), ServiceError> {
        let ddl = render_create_table(table)?;
        self.connection.execute_batch(&ddl).map_err(|err| map_db_error(&err))
    }

    fn drop_table(&mut self, table: &str) -> Result<(), ServiceError> {
        self.connection
            .execute_batch(&format!("DROP TABLE {};", quote_identifier(table)))
            .map_err(|err| map_db_error(&err))
    }

    fn applied_revision(&mut self) -> Result<Option<Revision>, ServiceError> {
        read_revision(self.connection)
    }

    fn set_applied_revision(&mut self, revision: Option<&Revision>) -> Result<(), ServiceError> {
        self.connection
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {VERSION_TABLE} (version_num VARCHAR(32) NOT NULL);
                 DELETE FROM {VERSION_TABLE};"
            ))
            .map_err(|err| map_db_error(&err))?;
        if let Some(revision) = revision {
            self.connection
                .execute(
                    &format!("INSERT INTO {VERSION_TABLE} (version_num) VALUES (?1)"),
                    params![revision.as_str()],
                )
                .map_err(|err| map_db_error(&err))?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when a table named `table` exists.
fn table_exists(connection: &Connection, table: &str) -> Result<bool, ServiceError> {
    connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()
        .map(|row| row.is_some())
        .map_err(|err| map_db_error(&err))
}

/// Reads the applied revision; a missing version table means base.
fn read_revision(connection: &Connection) -> Result<Option<Revision>, ServiceError> {
    if !table_exists(connection, VERSION_TABLE)? {
        return Ok(None);
    }
    let mut stmt = connection
        .prepare(&format!("SELECT version_num FROM {VERSION_TABLE}"))
        .map_err(|err| map_db_error(&err))?;
    let rows: Vec<String> = stmt
        .query_map(params![], |row| row.get(0))
        .map_err(|err| map_db_error(&err))?
        .collect::<Result<_, _>>()
        .map_err(|err| map_db_error(&err))?;
    match rows.as_slice() {
        [] => Ok(None),
        [revision] => Ok(Some(Revision::new(revision.as_str()))),
        _ => Err(ServiceError::migration(format!(
            "{VERSION_TABLE} holds {} rows; expected at most one",
            rows.len()
        ))),
    }
}

/// Quotes an identifier for use in DDL.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Returns the `SQLite` column type for a logical type.
fn column_sql(column: &ColumnDef) -> String {
    let sql_type = match column.column_type {
        ColumnType::String(length) => format!("VARCHAR({length})"),
        // Unix milliseconds.
        ColumnType::DateTime => "INTEGER".to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
    };
    let null = if column.nullable { "" } else { " NOT NULL" };
    format!("{} {sql_type}{null}", quote_identifier(&column.name))
}

/// Renders a `CREATE TABLE` statement.
///
/// # Errors
///
/// Returns [`ServiceError`] when the definition has no columns.
pub fn render_create_table(table: &TableDef) -> Result<String, ServiceError> {
    if table.columns.is_empty() {
        return Err(ServiceError::migration(format!("table {} defines no columns", table.name)));
    }
    let mut lines: Vec<String> = table.columns.iter().map(column_sql).collect();
    if !table.primary_key.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", quote_list(&table.primary_key)));
    }
    for foreign_key in &table.foreign_keys {
        lines.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_list(&foreign_key.columns),
            quote_identifier(&foreign_key.references_table),
            quote_list(&foreign_key.references_columns)
        ));
    }
    let mut ddl = format!("CREATE TABLE {} (\n", quote_identifier(&table.name));
    for (index, line) in lines.iter().enumerate() {
        let separator = if index + 1 == lines.len() { "" } else { "," };
        let _ = writeln!(ddl, "    {line}{separator}");
    }
    ddl.push_str(");");
    Ok(ddl)
}

/// Quotes and joins a list of identifiers.
fn quote_list(names: &[String]) -> String {
    names.iter().map(|name| quote_identifier(name)).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Tests
// ============================================================================
