// crates/secret-store-core/src/core/schema.rs
// ============================================================================
// Module: Secret Store Schema Model
// Description: Declarative table definitions and migration steps.
// Purpose: Keep migration steps as data so they can run against any backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`MigrationStep`] is a revision id, a back-pointer to its predecessor,
//! and two lists of [`SchemaOp`]s. Steps never talk to a database directly;
//! they run against a [`SchemaSession`], which lets tests drive them with an
//! in-memory fake.
//!
//! Creating a table is guarded: the step inspects the live schema first and
//! skips tables that already exist, so re-running an applied step changes
//! nothing. Dropping a table is not guarded and fails if the table is absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::core::identifiers::Revision;
use crate::errors::ServiceError;
use crate::interfaces::SchemaSession;

// ============================================================================
// SECTION: Table Definitions
// ============================================================================

/// Logical column types understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Bounded-length string.
    String(usize),
    /// Point in time.
    DateTime,
    /// True/false flag.
    Boolean,
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Logical type.
    pub column_type: ColumnType,
    /// Whether NULL is allowed.
    pub nullable: bool,
}

impl ColumnDef {
    /// Creates a NOT NULL column.
    #[must_use]
    pub fn required(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
        }
    }

    /// Creates a nullable column.
    #[must_use]
    pub fn nullable(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }
}

/// Foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub references_table: String,
    /// Referenced columns.
    pub references_columns: Vec<String>,
}

impl ForeignKey {
    /// Creates a single-column foreign key.
    #[must_use]
    pub fn new(column: &str, references_table: &str, references_column: &str) -> Self {
        Self {
            columns: vec![column.to_string()],
            references_table: references_table.to_string(),
            references_columns: vec![references_column.to_string()],
        }
    }
}

/// Table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Primary key columns.
    pub primary_key: Vec<String>,
    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDef {
    /// Starts a table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key.
    #[must_use]
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|column| (*column).to_string()).collect();
        self
    }

    /// Appends a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }
}

/// One structural change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOp {
    /// Create a table unless it already exists.
    CreateTable(TableDef),
    /// Drop a table; fails if it does not exist.
    DropTable {
        /// Table name.
        name: String,
    },
}

// ============================================================================
// SECTION: Migration Steps
// ============================================================================

/// Structural changes made by one step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StepOutcome {
    /// Tables created.
    pub created: Vec<String>,
    /// Tables already present and left untouched.
    pub skipped: Vec<String>,
    /// Tables dropped.
    pub dropped: Vec<String>,
}

impl StepOutcome {
    /// Returns the number of structures created or dropped.
    #[must_use]
    pub fn structural_changes(&self) -> usize {
        self.created.len() + self.dropped.len()
    }
}

/// A single schema revision.
///
/// # Invariants
/// - `down_revision` is `None` only for the root of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
    /// Unique revision id.
    pub revision: Revision,
    /// Predecessor revision.
    pub down_revision: Option<Revision>,
    /// Short human-readable name.
    pub description: String,
    /// Ops applied on upgrade, in order.
    pub upgrade_ops: Vec<SchemaOp>,
    /// Ops applied on downgrade, in order.
    pub downgrade_ops: Vec<SchemaOp>,
}

impl MigrationStep {
    /// Creates a step with no ops.
    #[must_use]
    pub fn new(revision: &str, down_revision: Option<&str>, description: &str) -> Self {
        Self {
            revision: Revision::new(revision),
            down_revision: down_revision.map(Revision::new),
            description: description.to_string(),
            upgrade_ops: Vec::new(),
            downgrade_ops: Vec::new(),
        }
    }

    /// Adds a guarded table creation on upgrade and the matching drop on downgrade.
    #[must_use]
    pub fn creates_table(mut self, table: TableDef) -> Self {
        self.downgrade_ops.insert(0, SchemaOp::DropTable {
            name: table.name.clone(),
        });
        self.upgrade_ops.push(SchemaOp::CreateTable(table));
        self
    }

    /// Appends an upgrade op.
    #[must_use]
    pub fn on_upgrade(mut self, op: SchemaOp) -> Self {
        self.upgrade_ops.push(op);
        self
    }

    /// Appends a downgrade op.
    #[must_use]
    pub fn on_downgrade(mut self, op: SchemaOp) -> Self {
        self.downgrade_ops.push(op);
        self
    }

    /// Applies the upgrade ops.
    ///
    /// # Errors
    ///
    /// Returns the first [`ServiceError`] raised by the session.
    pub fn upgrade(&self, session: &mut dyn SchemaSession) -> Result<StepOutcome, ServiceError> {
        apply_ops(&self.upgrade_ops, session)
    }

    /// Applies the downgrade ops.
    ///
    /// # Errors
    ///
    /// Returns the first [`ServiceError`] raised by the session.
    pub fn downgrade(&self, session: &mut dyn SchemaSession) -> Result<StepOutcome, ServiceError> {
        apply_ops(&self.downgrade_ops, session)
    }
}

/// Runs ops in order against the session.
fn apply_ops(
    ops: &[SchemaOp],
    session: &mut dyn SchemaSession,
) -> Result<StepOutcome, ServiceError> {
    let mut outcome = StepOutcome::default();
    for op in ops {
        match op {
            SchemaOp::CreateTable(table) => {
                if session.table_exists(&table.name)? {
                    outcome.skipped.push(table.name.clone());
                } else {
                    session.create_table(table)?;
                    outcome.created.push(table.name.clone());
                }
            }
            SchemaOp::DropTable {
                name,
            } => {
                session.drop_table(name)?;
                outcome.dropped.push(name.clone());
            }
        }
    }
    Ok(outcome)
}

// ============================================================================
// SECTION: Targets
// ============================================================================

/// Migration direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward head.
    Upgrade,
    /// Toward base.
    Downgrade,
}

/// Destination of an upgrade or downgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionTarget {
    /// No revision applied.
    Base,
    /// Latest revision in the chain.
    Head,
    /// A specific revision.
    Revision(Revision),
}

impl FromStr for RevisionTarget {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Err(ServiceError::migration("revision target must not be empty")),
            "base" => Ok(Self::Base),
            "head" => Ok(Self::Head),
            other => Ok(Self::Revision(Revision::new(other))),
        }
    }
}

impl fmt::Display for RevisionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::Head => f.write_str("head"),
            Self::Revision(revision) => revision.fmt(f),
        }
    }
}
