// crates/secret-store-config/src/lib.rs
// ============================================================================
// Module: Secret Store Config Library
// Description: Configuration model and validation for the secret store.
// Purpose: Single source of truth for secret-store.toml semantics.
// Dependencies: secret-store-core, secret-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `secret-store-config` defines the configuration model for the secret
//! store: which metadata backend to use, how migrations run on startup, how
//! error messages render, and where audit events go. Validation is strict and
//! fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
