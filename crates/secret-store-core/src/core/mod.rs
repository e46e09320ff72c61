// crates/secret-store-core/src/core/mod.rs
// ============================================================================
// Module: Secret Store Core Types
// Description: Identifiers, timestamps, metadata records, and schema steps.
// Purpose: Group the data model shared by stores and the migration runtime.
// Dependencies: crate::core::*
// ============================================================================

//! ## Overview
//! Core types are plain data. Behavior that touches a backing store lives in
//! [`crate::runtime`] or in backend crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod metadata;
pub mod schema;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::*;
pub use metadata::*;
pub use schema::*;
pub use time::*;
