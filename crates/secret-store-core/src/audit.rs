// crates/secret-store-core/src/audit.rs
// ============================================================================
// Module: Secret Store Audit Logging
// Description: Structured audit events for migrations and metadata writes.
// Purpose: Emit JSON-lines audit logs without a logging framework dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are small serializable payloads written one JSON object per
//! line. Deployments pick a sink (stderr, append-only file, or none) and can
//! route the lines into their own pipeline. Metadata values are never logged;
//! events carry identifiers and keys only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::Clock;
use crate::core::Direction;
use crate::core::MigrationStep;
use crate::core::SecretStoreMetadata;
use crate::core::StepOutcome;
use crate::core::SystemClock;
use crate::errors::ServiceError;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Audit event for one migration step.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Step revision.
    pub revision: String,
    /// Predecessor revision.
    pub down_revision: Option<String>,
    /// Direction the step ran in.
    pub direction: Direction,
    /// Tables created.
    pub created: usize,
    /// Tables skipped because they already existed.
    pub skipped: usize,
    /// Tables dropped.
    pub dropped: usize,
    /// Error kind when the step failed.
    pub error_kind: Option<&'static str>,
    /// Error message when the step failed.
    pub error: Option<String>,
}

impl MigrationAuditEvent {
    /// Builds an event for a step that completed.
    #[must_use]
    pub fn completed(step: &MigrationStep, direction: Direction, outcome: &StepOutcome) -> Self {
        let event = match direction {
            Direction::Upgrade => "migration_step_applied",
            Direction::Downgrade => "migration_step_reverted",
        };
        Self {
            event,
            timestamp_ms: SystemClock.now().as_unix_millis(),
            revision: step.revision.to_string(),
            down_revision: step.down_revision.as_ref().map(ToString::to_string),
            direction,
            created: outcome.created.len(),
            skipped: outcome.skipped.len(),
            dropped: outcome.dropped.len(),
            error_kind: None,
            error: None,
        }
    }

    /// Builds an event for a step that failed and was rolled back.
    #[must_use]
    pub fn failed(step: &MigrationStep, direction: Direction, error: &ServiceError) -> Self {
        Self {
            event: "migration_step_failed",
            timestamp_ms: SystemClock.now().as_unix_millis(),
            revision: step.revision.to_string(),
            down_revision: step.down_revision.as_ref().map(ToString::to_string),
            direction,
            created: 0,
            skipped: 0,
            dropped: 0,
            error_kind: Some(error.kind().name()),
            error: Some(error.message()),
        }
    }
}

/// Audit event for a metadata write.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Record identifier.
    pub metadata_id: String,
    /// Owning secret.
    pub secret_id: String,
    /// Attribute key.
    pub key: String,
    /// Lifecycle label after the write.
    pub status: String,
}

impl MetadataAuditEvent {
    /// Builds an event from the record state after the write.
    fn from_record(event: &'static str, record: &SecretStoreMetadata) -> Self {
        Self {
            event,
            timestamp_ms: record.updated_at.as_unix_millis(),
            metadata_id: record.id.to_string(),
            secret_id: record.secret_id.to_string(),
            key: record.key.clone(),
            status: record.status.to_string(),
        }
    }

    /// Event for a created record.
    #[must_use]
    pub fn created(record: &SecretStoreMetadata) -> Self {
        Self::from_record("metadata_created", record)
    }

    /// Event for an updated record.
    #[must_use]
    pub fn updated(record: &SecretStoreMetadata) -> Self {
        Self::from_record("metadata_updated", record)
    }

    /// Event for a soft-deleted record.
    #[must_use]
    pub fn soft_deleted(record: &SecretStoreMetadata) -> Self {
        Self::from_record("metadata_soft_deleted", record)
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Record a migration step event.
    fn record_migration(&self, event: &MigrationAuditEvent);

    /// Record a metadata write event.
    fn record_metadata(&self, _event: &MetadataAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_migration(&self, event: &MigrationAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_metadata(&self, event: &MetadataAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one serialized event line.
    fn write_line<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_migration(&self, event: &MigrationAuditEvent) {
        self.write_line(event);
    }

    fn record_metadata(&self, event: &MetadataAuditEvent) {
        self.write_line(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_migration(&self, _event: &MigrationAuditEvent) {}

    fn record_metadata(&self, _event: &MetadataAuditEvent) {}
}
