// crates/secret-store-core/src/lib.rs
// ============================================================================
// Module: Secret Store Core Library
// Description: Public API surface for the secret store metadata core.
// Purpose: Expose the data model, error taxonomy, interfaces, and runtime.
// Dependencies: crate::{audit, core, errors, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Secret store core owns the versioned schema for secret metadata and the
//! rules for reading and writing it. It is backend-agnostic: storage engines
//! implement [`MigrationTarget`] and [`SecretMetadataStore`], and the
//! [`MigrationExecutor`] walks the [`SchemaRegistry`] chain against them.
//! Invariants:
//! - Each migration step is applied at most once per store.
//! - Soft-deleted records are never returned by active-only reads.
//! - Every failure surfaces as a [`ServiceError`] with a stable kind.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod errors;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::MetadataAuditEvent;
pub use audit::MigrationAuditEvent;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use errors::ErrorCategory;
pub use errors::ErrorKind;
pub use errors::ErrorReport;
pub use errors::FormatMode;
pub use errors::MessageFormatError;
pub use errors::ServiceError;
pub use errors::escape_template;
pub use errors::format_message;
pub use errors::render_template;
pub use errors::set_strict_formatting;
pub use errors::strict_formatting;
pub use interfaces::MigrationTarget;
pub use interfaces::SchemaIntrospector;
pub use interfaces::SchemaSession;
pub use interfaces::SecretMetadataStore;
pub use interfaces::SessionWork;
pub use runtime::HistoryEntry;
pub use runtime::InMemoryMetadataStore;
pub use runtime::InMemorySchema;
pub use runtime::MigrationExecutor;
pub use runtime::MigrationReport;
pub use runtime::SchemaRegistry;
pub use runtime::StepReport;
