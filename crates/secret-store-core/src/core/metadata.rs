// crates/secret-store-core/src/core/metadata.rs
// ============================================================================
// Module: Secret Store Metadata Model
// Description: Key/value metadata records attached to secrets.
// Purpose: Define records, inputs, and update patches with column limits.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`SecretStoreMetadata`] row is one key/value attribute of a secret. Rows
//! are soft-deleted: `deleted` and `deleted_at` always change together.
//! Inputs are validated against the storage column limits before any store
//! sees them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::MAX_ID_LENGTH;
use crate::core::identifiers::MetadataId;
use crate::core::identifiers::SecretId;
use crate::core::time::Timestamp;
use crate::errors::ErrorKind;
use crate::errors::ServiceError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema name reported in validation errors.
pub const METADATA_SCHEMA: &str = "secret_store_metadata";
/// Maximum length of a metadata key, in characters.
pub const MAX_KEY_LENGTH: usize = 255;
/// Maximum length of a metadata value, in characters.
pub const MAX_VALUE_LENGTH: usize = 255;
/// Maximum length of a status label, in characters.
pub const MAX_STATUS_LENGTH: usize = 20;

/// Attributes callers may never change.
const READONLY_FIELDS: [&str; 3] = ["id", "secret_id", "created_at"];
/// Attributes only the store may change.
const RESERVED_FIELDS: [&str; 3] = ["updated_at", "deleted_at", "deleted"];

// ============================================================================
// SECTION: Status
// ============================================================================

/// Lifecycle label of a metadata record.
///
/// # Invariants
/// - Non-empty and at most [`MAX_STATUS_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetadataStatus(String);

impl MetadataStatus {
    /// Label for records in use.
    pub const ACTIVE: &'static str = "active";
    /// Label for records awaiting backend confirmation.
    pub const PENDING: &'static str = "pending";
    /// Label for records whose backend operation failed.
    pub const ERROR: &'static str = "error";

    /// Creates a validated status label.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the label is empty or too long.
    pub fn new(value: impl Into<String>) -> Result<Self, ServiceError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ServiceError::invalid_object(
                METADATA_SCHEMA,
                "status must not be empty",
                Some("status"),
            ));
        }
        ensure_length("status", &value, MAX_STATUS_LENGTH)?;
        Ok(Self(value))
    }

    /// Returns the `active` status.
    #[must_use]
    pub fn active() -> Self {
        Self(Self::ACTIVE.to_string())
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MetadataStatus {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MetadataStatus> for String {
    fn from(value: MetadataStatus) -> Self {
        value.0
    }
}

impl fmt::Display for MetadataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// One key/value attribute attached to a secret.
///
/// # Invariants
/// - `deleted == deleted_at.is_some()`.
/// - `updated_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretStoreMetadata {
    /// Record identifier.
    pub id: MetadataId,
    /// Owning secret.
    pub secret_id: SecretId,
    /// Attribute key.
    pub key: String,
    /// Attribute value.
    pub value: String,
    /// Lifecycle label.
    pub status: MetadataStatus,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last write time.
    pub updated_at: Timestamp,
    /// Soft-delete time.
    pub deleted_at: Option<Timestamp>,
    /// Soft-delete flag.
    pub deleted: bool,
}

impl SecretStoreMetadata {
    /// Returns true when the record is not soft-deleted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Marks the record deleted at `now`. Already-deleted records are left as is.
    pub fn mark_deleted(&mut self, now: Timestamp) {
        if self.deleted {
            return;
        }
        self.deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

/// Record visibility for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only records that are not soft-deleted.
    #[default]
    ActiveOnly,
    /// Soft-deleted records too, for audit.
    IncludeDeleted,
}

impl Visibility {
    /// Returns true when `record` is visible under this setting.
    #[must_use]
    pub const fn admits(self, record: &SecretStoreMetadata) -> bool {
        match self {
            Self::ActiveOnly => record.is_active(),
            Self::IncludeDeleted => true,
        }
    }
}

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Input for creating a metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewMetadata {
    /// Owning secret.
    pub secret_id: SecretId,
    /// Attribute key.
    pub key: String,
    /// Attribute value.
    pub value: String,
    /// Lifecycle label.
    pub status: MetadataStatus,
}

impl NewMetadata {
    /// Creates a new input.
    #[must_use]
    pub fn new(
        secret_id: SecretId,
        key: impl Into<String>,
        value: impl Into<String>,
        status: MetadataStatus,
    ) -> Self {
        Self {
            secret_id,
            key: key.into(),
            value: value.into(),
            status,
        }
    }

    /// Validates the input against column limits.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when a field is empty or too long.
    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_secret_id(&self.secret_id)?;
        validate_key(&self.key)?;
        ensure_length("value", &self.value, MAX_VALUE_LENGTH)
    }

    /// Builds the stored record for this input.
    #[must_use]
    pub fn into_record(self, id: MetadataId, now: Timestamp) -> SecretStoreMetadata {
        SecretStoreMetadata {
            id,
            secret_id: self.secret_id,
            key: self.key,
            value: self.value,
            status: self.status,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted: false,
        }
    }
}

/// Patch of mutable record attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataUpdate {
    /// Replacement key.
    pub key: Option<String>,
    /// Replacement value.
    pub value: Option<String>,
    /// Replacement status.
    pub status: Option<MetadataStatus>,
}

impl MetadataUpdate {
    /// Builds a patch from untyped attribute/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ReadonlyProperty`] for `id`, `secret_id`, and
    /// `created_at`, [`ErrorKind::ReservedProperty`] for store-managed
    /// attributes, [`ErrorKind::UnsupportedField`] for unknown names, and
    /// [`ErrorKind::NoDataToProcess`] when nothing would change.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut update = Self::default();
        for (field, value) in fields {
            check_mutable(field)?;
            match field {
                "key" => update.key = Some(value.to_string()),
                "value" => update.value = Some(value.to_string()),
                "status" => update.status = Some(MetadataStatus::new(value)?),
                other => {
                    return Err(ServiceError::new(ErrorKind::UnsupportedField {
                        field: other.to_string(),
                        schema: METADATA_SCHEMA.to_string(),
                        reason: "unknown attribute".to_string(),
                    }));
                }
            }
        }
        if update.is_empty() {
            return Err(ServiceError::new(ErrorKind::NoDataToProcess));
        }
        Ok(update)
    }

    /// Builds a patch from a JSON object body.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`MetadataUpdate::from_fields`], plus
    /// [`ErrorKind::InvalidObject`] when the body is not an object of strings.
    pub fn from_json(body: &Value) -> Result<Self, ServiceError> {
        let Some(object) = body.as_object() else {
            return Err(ServiceError::invalid_object(
                METADATA_SCHEMA,
                "update body must be a JSON object",
                None,
            ));
        };
        let mut fields = Vec::with_capacity(object.len());
        for (field, value) in object {
            check_mutable(field)?;
            let Some(text) = value.as_str() else {
                return Err(ServiceError::invalid_object(
                    METADATA_SCHEMA,
                    format!("attribute '{field}' must be a string"),
                    Some(field),
                ));
            };
            fields.push((field.as_str(), text));
        }
        Self::from_fields(fields)
    }

    /// Returns true when the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.key.is_none() && self.value.is_none() && self.status.is_none()
    }

    /// Validates replacement values against column limits.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when a replacement is empty or too long.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(key) = &self.key {
            validate_key(key)?;
        }
        if let Some(value) = &self.value {
            ensure_length("value", value, MAX_VALUE_LENGTH)?;
        }
        Ok(())
    }

    /// Applies the patch to `record`, stamping `updated_at`.
    pub fn apply(&self, record: &mut SecretStoreMetadata, now: Timestamp) {
        if let Some(key) = &self.key {
            record.key.clone_from(key);
        }
        if let Some(value) = &self.value {
            record.value.clone_from(value);
        }
        if let Some(status) = &self.status {
            record.status = status.clone();
        }
        record.updated_at = now;
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Rejects attributes callers may not set.
fn check_mutable(field: &str) -> Result<(), ServiceError> {
    if READONLY_FIELDS.contains(&field) {
        return Err(ServiceError::readonly_property(field));
    }
    if RESERVED_FIELDS.contains(&field) {
        return Err(ServiceError::reserved_property(field));
    }
    Ok(())
}

/// Validates a metadata key.
fn validate_key(key: &str) -> Result<(), ServiceError> {
    if key.is_empty() {
        return Err(ServiceError::invalid_object(
            METADATA_SCHEMA,
            "key must not be empty",
            Some("key"),
        ));
    }
    ensure_length("key", key, MAX_KEY_LENGTH)
}

/// Validates an owning secret identifier.
fn validate_secret_id(secret_id: &SecretId) -> Result<(), ServiceError> {
    if secret_id.as_str().is_empty() {
        return Err(ServiceError::invalid_object(
            METADATA_SCHEMA,
            "secret_id must not be empty",
            Some("secret_id"),
        ));
    }
    ensure_length("secret_id", secret_id.as_str(), MAX_ID_LENGTH)
}

/// Rejects values longer than `max` characters.
fn ensure_length(property: &str, value: &str, max: usize) -> Result<(), ServiceError> {
    let length = value.chars().count();
    if length > max {
        return Err(ServiceError::invalid_object(
            METADATA_SCHEMA,
            format!("{property} exceeds {max} characters ({length})"),
            Some(property),
        ));
    }
    Ok(())
}
