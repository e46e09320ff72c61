// crates/secret-store-core/src/runtime/mod.rs
// ============================================================================
// Module: Secret Store Runtime
// Description: Schema registry, migration executor, and in-memory backends.
// Purpose: Move stores between schema revisions and serve metadata in tests.
// Dependencies: crate::{audit, core, errors, interfaces}
// ============================================================================

//! ## Overview
//! The registry validates the migration chain once; the executor applies it
//! to any [`crate::interfaces::MigrationTarget`]. The in-memory backends run
//! the same contracts as the SQLite crate and back the property tests.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod executor;
pub mod memory;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use executor::HistoryEntry;
pub use executor::MigrationExecutor;
pub use executor::MigrationReport;
pub use executor::StepReport;
pub use memory::InMemoryMetadataStore;
pub use memory::InMemorySchema;
pub use registry::SchemaRegistry;
