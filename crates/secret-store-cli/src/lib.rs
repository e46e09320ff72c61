// crates/secret-store-cli/src/lib.rs
// ============================================================================
// Module: Secret Store CLI Library
// Description: Shared command logic for the secret-store binary.
// Purpose: Let the binary and integration tests run the same commands.
// Dependencies: crate::commands
// ============================================================================

//! ## Overview
//! The binary entry point (`src/main.rs`) parses arguments, loads
//! configuration, and prints results. The command bodies live here so tests
//! can drive them against temporary databases.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod commands;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use commands::CliError;
pub use commands::ConfigSummary;
pub use commands::CurrentRevision;
pub use commands::migrate_current;
pub use commands::migrate_downgrade;
pub use commands::migrate_history;
pub use commands::migrate_upgrade;
pub use commands::validate_config;
