// crates/secret-store-core/src/errors.rs
// ============================================================================
// Module: Secret Store Error Taxonomy
// Description: Typed, parameterized failure kinds surfaced to callers.
// Purpose: Keep every failure distinguishable with structured parameters.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every failure raised by the metadata store and the migration executor is a
//! [`ServiceError`] wrapping one [`ErrorKind`]. Kinds carry their named
//! parameters as typed fields and render a human-readable message from a
//! template with `{name}` placeholders.
//!
//! Rendering never fails by default: a template whose placeholders cannot be
//! satisfied falls back to the raw template text. Strict formatting (see
//! [`set_strict_formatting`]) turns that fallback into a
//! [`MessageFormatError`] for test and debug builds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Formatting Mode
// ============================================================================

/// Process-wide strict formatting toggle.
static STRICT_FORMATTING: AtomicBool = AtomicBool::new(false);

/// Enables or disables strict message formatting for the process.
pub fn set_strict_formatting(enabled: bool) {
    STRICT_FORMATTING.store(enabled, Ordering::SeqCst);
}

/// Returns true when strict message formatting is enabled.
#[must_use]
pub fn strict_formatting() -> bool {
    STRICT_FORMATTING.load(Ordering::SeqCst)
}

/// Message rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    /// Fall back to the unformatted template on substitution failure.
    Lenient,
    /// Report substitution failures as errors.
    Strict,
}

impl FormatMode {
    /// Returns the mode selected by the process-wide toggle.
    #[must_use]
    pub fn current() -> Self {
        if strict_formatting() { Self::Strict } else { Self::Lenient }
    }
}

/// Template substitution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageFormatError {
    /// Placeholder named a parameter that was not supplied.
    #[error("message template references missing parameter `{0}`")]
    MissingParameter(String),
    /// Placeholder was opened but never closed.
    #[error("message template has an unterminated placeholder at byte {0}")]
    UnterminatedPlaceholder(usize),
    /// Closing brace without a matching opening brace.
    #[error("message template has an unmatched `}}` at byte {0}")]
    UnmatchedBrace(usize),
}

/// Substitutes `{name}` placeholders with parameter values.
///
/// `{{` and `}}` render literal braces.
///
/// # Errors
///
/// Returns [`MessageFormatError`] when a placeholder is malformed or names a
/// parameter that is not present in `params`.
pub fn render_template(
    template: &str,
    params: &[(&str, String)],
) -> Result<String, MessageFormatError> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '{' => {
                if chars.next_if(|(_, next)| *next == '{').is_some() {
                    output.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(MessageFormatError::UnterminatedPlaceholder(offset));
                }
                let value = params
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| value)
                    .ok_or(MessageFormatError::MissingParameter(name))?;
                output.push_str(value);
            }
            '}' => {
                if chars.next_if(|(_, next)| *next == '}').is_none() {
                    return Err(MessageFormatError::UnmatchedBrace(offset));
                }
                output.push('}');
            }
            other => output.push(other),
        }
    }
    Ok(output)
}

/// Doubles braces so `text` renders verbatim when embedded in a template.
#[must_use]
pub fn escape_template(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// Renders a template under the given mode.
///
/// # Errors
///
/// Returns [`MessageFormatError`] only in [`FormatMode::Strict`].
pub fn format_message(
    template: &str,
    params: &[(&str, String)],
    mode: FormatMode,
) -> Result<String, MessageFormatError> {
    match render_template(template, params) {
        Ok(message) => Ok(message),
        Err(err) => match mode {
            FormatMode::Strict => Err(err),
            FormatMode::Lenient => Ok(template.to_string()),
        },
    }
}

// ============================================================================
// SECTION: Categories
// ============================================================================

/// Coarse grouping used by API layers to map kinds onto transport responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Lookup failures (not found, duplicate).
    Lookup,
    /// Rejected input data.
    Validation,
    /// Authentication and authorization failures.
    Authorization,
    /// Misconfigured stores, drivers, or clients.
    Configuration,
    /// Schema loading and migration failures.
    Migration,
    /// Retryable overload or outage conditions.
    Transient,
    /// Upstream transport and protocol failures.
    Transport,
    /// Backing storage capacity or permission failures.
    Storage,
    /// Uncategorized failures.
    General,
}

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Failure kinds with their named parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unclassified failure.
    Generic,
    /// A required argument was not supplied.
    MissingArgument,
    /// A required credential was not supplied.
    MissingCredential {
        /// Name of the missing credential.
        required: String,
    },
    /// Configured auth strategy did not match.
    BadAuthStrategy {
        /// Expected strategy.
        expected: String,
        /// Received strategy.
        received: String,
    },
    /// No object matched the identifier.
    NotFound,
    /// URI carried an unknown scheme.
    UnknownScheme {
        /// Offending scheme.
        scheme: String,
    },
    /// Store URI was malformed.
    BadStoreUri,
    /// An object with the same identifier already exists.
    Duplicate,
    /// Storage media is full.
    StorageFull,
    /// Writing to storage media was denied.
    StorageWriteDenied,
    /// Auth service rejected the connection or request.
    AuthBadRequest {
        /// Auth service URL.
        url: String,
    },
    /// Auth service URL was not found.
    AuthUrlNotFound {
        /// Auth service URL.
        url: String,
    },
    /// Authorization failed.
    AuthorizationFailure,
    /// Caller is not authenticated.
    NotAuthenticated,
    /// Caller is not authorized.
    Forbidden,
    /// Operation is not supported.
    NotSupported,
    /// Access to a public image was denied.
    ForbiddenPublicImage,
    /// Protected image cannot be deleted.
    ProtectedImageDelete {
        /// Image identifier.
        image_id: String,
    },
    /// Legacy alias of [`ErrorKind::Forbidden`].
    NotAuthorized,
    /// Supplied data was not valid.
    Invalid,
    /// No data was supplied.
    NoDataToProcess,
    /// Sort key was not valid.
    InvalidSortKey,
    /// Filter range could not be applied.
    InvalidFilterRangeValue,
    /// Attribute cannot be changed.
    ReadonlyProperty {
        /// Attribute name.
        property: String,
    },
    /// Attribute is reserved for the store.
    ReservedProperty {
        /// Attribute name.
        property: String,
    },
    /// Caller must be redirected for authorization.
    AuthorizationRedirect {
        /// Redirect target.
        uri: String,
    },
    /// Migrating the database failed.
    DatabaseMigrationError {
        /// Failure detail.
        reason: String,
    },
    /// Connecting to a server failed.
    ClientConnectionError,
    /// Client configuration failed.
    ClientConfigurationError,
    /// Upstream returned 302 Multiple Choices.
    MultipleChoices {
        /// Upstream response body.
        body: String,
    },
    /// Rate limit or quota was exceeded.
    LimitExceeded {
        /// Upstream response body.
        body: String,
        /// Raw retry-after parameter.
        retry: Option<String>,
    },
    /// Service is overloaded or in a transient outage.
    ServiceUnavailable {
        /// Raw retry-after parameter.
        retry: Option<String>,
    },
    /// Upstream or backing store reported an internal error.
    ServerError,
    /// Upstream returned an unexpected status.
    UnexpectedStatus {
        /// Status value.
        status: String,
        /// Upstream response body.
        body: String,
    },
    /// Content type is not accepted.
    InvalidContentType {
        /// Offending content type.
        content_type: String,
    },
    /// Content encoding is not accepted.
    InvalidContentEncoding {
        /// Offending content encoding.
        content_encoding: String,
    },
    /// Payload could not be decoded.
    PayloadDecodingError,
    /// Registry connection is misconfigured.
    BadRegistryConnectionConfiguration {
        /// Failure detail.
        reason: String,
    },
    /// Secret store backend is misconfigured.
    BadStoreConfiguration {
        /// Store name.
        store_name: String,
        /// Failure detail.
        reason: String,
    },
    /// Driver is misconfigured.
    BadDriverConfiguration {
        /// Driver name.
        driver_name: String,
        /// Failure detail.
        reason: String,
    },
    /// Store does not support deletes.
    StoreDeleteNotSupported,
    /// Store has adds disabled.
    StoreAddDisabled,
    /// Notifier strategy is unknown.
    InvalidNotifierStrategy {
        /// Strategy name.
        strategy: String,
    },
    /// Redirect limit was exceeded.
    MaxRedirectsExceeded {
        /// Redirect limit.
        redirects: String,
    },
    /// Upstream returned an invalid redirect.
    InvalidRedirect,
    /// Service catalog has no endpoint for this service.
    NoServiceEndpoint,
    /// More than one endpoint matched the region.
    RegionAmbiguity {
        /// Region name.
        region: String,
    },
    /// Worker creation failed.
    WorkerCreationFailure {
        /// Failure detail.
        reason: String,
    },
    /// A schema definition could not be loaded.
    SchemaLoadError {
        /// Failure detail.
        reason: String,
    },
    /// Object does not match its schema.
    InvalidObject {
        /// Schema name.
        schema: String,
        /// Failure detail.
        reason: String,
        /// Offending property, when known.
        property: Option<String>,
    },
    /// Field value is not supported by the schema.
    UnsupportedField {
        /// Field name.
        field: String,
        /// Schema name.
        schema: String,
        /// Failure detail.
        reason: String,
    },
    /// Header feature is unsupported.
    UnsupportedHeaderFeature {
        /// Feature name.
        feature: String,
    },
    /// Object is in use by the backend store.
    InUseByStore,
    /// Object exceeds the size limit.
    ImageSizeLimitExceeded,
}

impl ErrorKind {
    /// Returns the stable snake_case name of the kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::MissingArgument => "missing_argument",
            Self::MissingCredential {
                ..
            } => "missing_credential",
            Self::BadAuthStrategy {
                ..
            } => "bad_auth_strategy",
            Self::NotFound => "not_found",
            Self::UnknownScheme {
                ..
            } => "unknown_scheme",
            Self::BadStoreUri => "bad_store_uri",
            Self::Duplicate => "duplicate",
            Self::StorageFull => "storage_full",
            Self::StorageWriteDenied => "storage_write_denied",
            Self::AuthBadRequest {
                ..
            } => "auth_bad_request",
            Self::AuthUrlNotFound {
                ..
            } => "auth_url_not_found",
            Self::AuthorizationFailure => "authorization_failure",
            Self::NotAuthenticated => "not_authenticated",
            Self::Forbidden => "forbidden",
            Self::NotSupported => "not_supported",
            Self::ForbiddenPublicImage => "forbidden_public_image",
            Self::ProtectedImageDelete {
                ..
            } => "protected_image_delete",
            Self::NotAuthorized => "not_authorized",
            Self::Invalid => "invalid",
            Self::NoDataToProcess => "no_data_to_process",
            Self::InvalidSortKey => "invalid_sort_key",
            Self::InvalidFilterRangeValue => "invalid_filter_range_value",
            Self::ReadonlyProperty {
                ..
            } => "readonly_property",
            Self::ReservedProperty {
                ..
            } => "reserved_property",
            Self::AuthorizationRedirect {
                ..
            } => "authorization_redirect",
            Self::DatabaseMigrationError {
                ..
            } => "database_migration_error",
            Self::ClientConnectionError => "client_connection_error",
            Self::ClientConfigurationError => "client_configuration_error",
            Self::MultipleChoices {
                ..
            } => "multiple_choices",
            Self::LimitExceeded {
                ..
            } => "limit_exceeded",
            Self::ServiceUnavailable {
                ..
            } => "service_unavailable",
            Self::ServerError => "server_error",
            Self::UnexpectedStatus {
                ..
            } => "unexpected_status",
            Self::InvalidContentType {
                ..
            } => "invalid_content_type",
            Self::InvalidContentEncoding {
                ..
            } => "invalid_content_encoding",
            Self::PayloadDecodingError => "payload_decoding_error",
            Self::BadRegistryConnectionConfiguration {
                ..
            } => "bad_registry_connection_configuration",
            Self::BadStoreConfiguration {
                ..
            } => "bad_store_configuration",
            Self::BadDriverConfiguration {
                ..
            } => "bad_driver_configuration",
            Self::StoreDeleteNotSupported => "store_delete_not_supported",
            Self::StoreAddDisabled => "store_add_disabled",
            Self::InvalidNotifierStrategy {
                ..
            } => "invalid_notifier_strategy",
            Self::MaxRedirectsExceeded {
                ..
            } => "max_redirects_exceeded",
            Self::InvalidRedirect => "invalid_redirect",
            Self::NoServiceEndpoint => "no_service_endpoint",
            Self::RegionAmbiguity {
                ..
            } => "region_ambiguity",
            Self::WorkerCreationFailure {
                ..
            } => "worker_creation_failure",
            Self::SchemaLoadError {
                ..
            } => "schema_load_error",
            Self::InvalidObject {
                ..
            } => "invalid_object",
            Self::UnsupportedField {
                ..
            } => "unsupported_field",
            Self::UnsupportedHeaderFeature {
                ..
            } => "unsupported_header_feature",
            Self::InUseByStore => "in_use_by_store",
            Self::ImageSizeLimitExceeded => "image_size_limit_exceeded",
        }
    }

    /// Returns the default message template for the kind.
    #[must_use]
    pub const fn default_template(&self) -> &'static str {
        match self {
            Self::Generic => "An unknown exception occurred",
            Self::MissingArgument => "Missing required argument.",
            Self::MissingCredential {
                ..
            } => "Missing required credential: {required}",
            Self::BadAuthStrategy {
                ..
            } => "Incorrect auth strategy, expected \"{expected}\" but received \"{received}\"",
            Self::NotFound => "An object with the specified identifier was not found.",
            Self::UnknownScheme {
                ..
            } => "Unknown scheme '{scheme}' found in URI",
            Self::BadStoreUri => "The Store URI was malformed.",
            Self::Duplicate => "An object with the same identifier already exists.",
            Self::StorageFull => "There is not enough disk space on the storage media.",
            Self::StorageWriteDenied => "Permission to write storage media denied.",
            Self::AuthBadRequest {
                ..
            } => "Connect error/bad request to Auth service at URL {url}.",
            Self::AuthUrlNotFound {
                ..
            } => "Auth service at URL {url} not found.",
            Self::AuthorizationFailure => "Authorization failed.",
            Self::NotAuthenticated => "You are not authenticated.",
            Self::Forbidden | Self::ForbiddenPublicImage | Self::NotAuthorized => {
                "You are not authorized to complete this action."
            }
            Self::NotSupported => "Operation is not supported.",
            Self::ProtectedImageDelete {
                ..
            } => "Image {image_id} is protected and cannot be deleted.",
            Self::Invalid => "Data supplied was not valid.",
            Self::NoDataToProcess => "No data supplied to process.",
            Self::InvalidSortKey => "Sort key supplied was not valid.",
            Self::InvalidFilterRangeValue => "Unable to filter using the specified range.",
            Self::ReadonlyProperty {
                ..
            } => "Attribute '{property}' is read-only.",
            Self::ReservedProperty {
                ..
            } => "Attribute '{property}' is reserved.",
            Self::AuthorizationRedirect {
                ..
            } => "Redirecting to {uri} for authorization.",
            Self::DatabaseMigrationError {
                ..
            } => "There was an error migrating the database: {reason}",
            Self::ClientConnectionError => "There was an error connecting to a server",
            Self::ClientConfigurationError => "There was an error configuring the client.",
            Self::MultipleChoices {
                ..
            } => {
                "The request returned a 302 Multiple Choices. This generally means that you have \
                 not included a version indicator in a request URI.\n\nThe body of response \
                 returned:\n{body}"
            }
            Self::LimitExceeded {
                ..
            } => {
                "The request returned a 413 Request Entity Too Large. This generally means that \
                 rate limiting or a quota threshold was breached.\n\nThe response body:\n{body}"
            }
            Self::ServiceUnavailable {
                ..
            } => {
                "The request returned 503 Service Unavailable. This generally occurs on service \
                 overload or other transient outage."
            }
            Self::ServerError => "The request returned 500 Internal Server Error.",
            Self::UnexpectedStatus {
                ..
            } => "The request returned an unexpected status: {status}.\n\nThe response body:\n{body}",
            Self::InvalidContentType {
                ..
            } => "Invalid content type {content_type}",
            Self::InvalidContentEncoding {
                ..
            } => "Invalid content encoding {content_encoding}",
            Self::PayloadDecodingError => "Error while attempting to decode payload.",
            Self::BadRegistryConnectionConfiguration {
                ..
            } => "Registry was not configured correctly on API server. Reason: {reason}",
            Self::BadStoreConfiguration {
                ..
            } => "Store {store_name} could not be configured correctly. Reason: {reason}",
            Self::BadDriverConfiguration {
                ..
            } => "Driver {driver_name} could not be configured correctly. Reason: {reason}",
            Self::StoreDeleteNotSupported => "Deleting objects from this store is not supported.",
            Self::StoreAddDisabled => {
                "Configuration for store failed. Adding objects to this store is disabled."
            }
            Self::InvalidNotifierStrategy {
                ..
            } => "'{strategy}' is not an available notifier strategy.",
            Self::MaxRedirectsExceeded {
                ..
            } => "Maximum redirects ({redirects}) was exceeded.",
            Self::InvalidRedirect => "Received invalid HTTP redirect.",
            Self::NoServiceEndpoint => {
                "Response from the identity service does not contain a secret store endpoint."
            }
            Self::RegionAmbiguity {
                ..
            } => {
                "Multiple service matches for region {region}. This generally means that a region \
                 is required and you have not supplied one."
            }
            Self::WorkerCreationFailure {
                ..
            } => "Server worker creation failed: {reason}.",
            Self::SchemaLoadError {
                ..
            } => "Unable to load schema: {reason}",
            Self::InvalidObject {
                ..
            } => "Provided object does not match schema '{schema}': {reason}",
            Self::UnsupportedField {
                ..
            } => "No support for value set on field '{field}' on schema '{schema}': {reason}",
            Self::UnsupportedHeaderFeature {
                ..
            } => "Provided header feature is unsupported: {feature}",
            Self::InUseByStore => {
                "The object cannot be deleted because it is in use through the backend store."
            }
            Self::ImageSizeLimitExceeded => "The provided object is too large.",
        }
    }

    /// Returns the named parameters carried by the kind.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::MissingCredential {
                required,
            } => vec![("required", required.clone())],
            Self::BadAuthStrategy {
                expected,
                received,
            } => vec![("expected", expected.clone()), ("received", received.clone())],
            Self::UnknownScheme {
                scheme,
            } => vec![("scheme", scheme.clone())],
            Self::AuthBadRequest {
                url,
            }
            | Self::AuthUrlNotFound {
                url,
            } => vec![("url", url.clone())],
            Self::ProtectedImageDelete {
                image_id,
            } => vec![("image_id", image_id.clone())],
            Self::ReadonlyProperty {
                property,
            }
            | Self::ReservedProperty {
                property,
            } => vec![("property", property.clone())],
            Self::AuthorizationRedirect {
                uri,
            } => vec![("uri", uri.clone())],
            Self::DatabaseMigrationError {
                reason,
            }
            | Self::BadRegistryConnectionConfiguration {
                reason,
            }
            | Self::WorkerCreationFailure {
                reason,
            }
            | Self::SchemaLoadError {
                reason,
            } => vec![("reason", reason.clone())],
            Self::MultipleChoices {
                body,
            } => vec![("body", body.clone())],
            Self::LimitExceeded {
                body,
                retry,
            } => {
                let mut params = vec![("body", body.clone())];
                if let Some(retry) = retry {
                    params.push(("retry", retry.clone()));
                }
                params
            }
            Self::ServiceUnavailable {
                retry,
            } => retry.iter().map(|retry| ("retry", retry.clone())).collect(),
            Self::UnexpectedStatus {
                status,
                body,
            } => vec![("status", status.clone()), ("body", body.clone())],
            Self::InvalidContentType {
                content_type,
            } => vec![("content_type", content_type.clone())],
            Self::InvalidContentEncoding {
                content_encoding,
            } => vec![("content_encoding", content_encoding.clone())],
            Self::BadStoreConfiguration {
                store_name,
                reason,
            } => vec![("store_name", store_name.clone()), ("reason", reason.clone())],
            Self::BadDriverConfiguration {
                driver_name,
                reason,
            } => vec![("driver_name", driver_name.clone()), ("reason", reason.clone())],
            Self::InvalidNotifierStrategy {
                strategy,
            } => vec![("strategy", strategy.clone())],
            Self::MaxRedirectsExceeded {
                redirects,
            } => vec![("redirects", redirects.clone())],
            Self::RegionAmbiguity {
                region,
            } => vec![("region", region.clone())],
            Self::InvalidObject {
                schema,
                reason,
                property,
            } => {
                let mut params = vec![("schema", schema.clone()), ("reason", reason.clone())];
                if let Some(property) = property {
                    params.push(("property", property.clone()));
                }
                params
            }
            Self::UnsupportedField {
                field,
                schema,
                reason,
            } => vec![("field", field.clone()), ("schema", schema.clone()), ("reason", reason.clone())],
            Self::UnsupportedHeaderFeature {
                feature,
            } => vec![("feature", feature.clone())],
            _ => Vec::new(),
        }
    }

    /// Returns the coarse category for the kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound
            | Self::Duplicate
            | Self::AuthUrlNotFound {
                ..
            } => ErrorCategory::Lookup,
            Self::MissingArgument
            | Self::Invalid
            | Self::NoDataToProcess
            | Self::InvalidSortKey
            | Self::InvalidFilterRangeValue
            | Self::InvalidContentType {
                ..
            }
            | Self::InvalidContentEncoding {
                ..
            }
            | Self::PayloadDecodingError
            | Self::InvalidObject {
                ..
            }
            | Self::UnsupportedField {
                ..
            }
            | Self::UnsupportedHeaderFeature {
                ..
            }
            | Self::ImageSizeLimitExceeded => ErrorCategory::Validation,
            Self::MissingCredential {
                ..
            }
            | Self::BadAuthStrategy {
                ..
            }
            | Self::AuthBadRequest {
                ..
            }
            | Self::AuthorizationFailure
            | Self::NotAuthenticated
            | Self::Forbidden
            | Self::ForbiddenPublicImage
            | Self::ProtectedImageDelete {
                ..
            }
            | Self::NotAuthorized
            | Self::ReadonlyProperty {
                ..
            }
            | Self::ReservedProperty {
                ..
            }
            | Self::AuthorizationRedirect {
                ..
            } => ErrorCategory::Authorization,
            Self::UnknownScheme {
                ..
            }
            | Self::BadStoreUri
            | Self::ClientConfigurationError
            | Self::BadRegistryConnectionConfiguration {
                ..
            }
            | Self::BadStoreConfiguration {
                ..
            }
            | Self::BadDriverConfiguration {
                ..
            }
            | Self::InvalidNotifierStrategy {
                ..
            }
            | Self::NoServiceEndpoint
            | Self::RegionAmbiguity {
                ..
            } => ErrorCategory::Configuration,
            Self::DatabaseMigrationError {
                ..
            }
            | Self::SchemaLoadError {
                ..
            } => ErrorCategory::Migration,
            Self::LimitExceeded {
                ..
            }
            | Self::ServiceUnavailable {
                ..
            } => ErrorCategory::Transient,
            Self::ClientConnectionError
            | Self::MultipleChoices {
                ..
            }
            | Self::ServerError
            | Self::UnexpectedStatus {
                ..
            }
            | Self::MaxRedirectsExceeded {
                ..
            }
            | Self::InvalidRedirect => ErrorCategory::Transport,
            Self::StorageFull
            | Self::StorageWriteDenied
            | Self::StoreDeleteNotSupported
            | Self::StoreAddDisabled
            | Self::InUseByStore => ErrorCategory::Storage,
            Self::Generic | Self::NotSupported | Self::WorkerCreationFailure {
                ..
            } => ErrorCategory::General,
        }
    }

    /// Returns true for [`ErrorKind::Forbidden`] and its specializations.
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(
            self,
            Self::Forbidden
                | Self::ForbiddenPublicImage
                | Self::ProtectedImageDelete { .. }
                | Self::NotAuthorized
                | Self::ReadonlyProperty { .. }
                | Self::ReservedProperty { .. }
        )
    }

    /// Returns true for [`ErrorKind::Invalid`] and its specializations.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid | Self::InvalidSortKey | Self::InvalidFilterRangeValue)
    }
}

// ============================================================================
// SECTION: Service Error
// ============================================================================

/// Error value surfaced by the metadata store and migration executor.
///
/// # Invariants
/// - `Display` never fails; it uses lenient rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// Failure kind with its parameters.
    kind: ErrorKind,
    /// Caller-supplied template overriding the kind default.
    template: Option<String>,
}

impl ServiceError {
    /// Creates an error for the given kind with its default template.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            template: None,
        }
    }

    /// Replaces the message template. Placeholders bind to the kind parameters.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Returns the failure kind.
    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the template used for rendering.
    #[must_use]
    pub fn template(&self) -> &str {
        self.template.as_deref().unwrap_or_else(|| self.kind.default_template())
    }

    /// Renders the message, falling back to the raw template on failure.
    #[must_use]
    pub fn message(&self) -> String {
        let template = self.template();
        render_template(template, &self.kind.params()).unwrap_or_else(|_| template.to_string())
    }

    /// Renders the message honoring the process-wide formatting mode.
    ///
    /// # Errors
    ///
    /// Returns [`MessageFormatError`] when strict formatting is enabled and
    /// the template cannot be satisfied.
    pub fn try_message(&self) -> Result<String, MessageFormatError> {
        format_message(self.template(), &self.kind.params(), FormatMode::current())
    }

    /// Returns the retry-after hint for retryable kinds.
    ///
    /// Absent, empty, or non-numeric values yield `None`.
    #[must_use]
    pub fn retry_after(&self) -> Option<u64> {
        let retry = match &self.kind {
            ErrorKind::LimitExceeded {
                retry, ..
            }
            | ErrorKind::ServiceUnavailable {
                retry,
            } => retry.as_deref(),
            _ => None,
        }?;
        retry.trim().parse().ok()
    }

    /// Returns the offending property for [`ErrorKind::InvalidObject`].
    #[must_use]
    pub fn invalid_property(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::InvalidObject {
                property, ..
            } => property.as_deref(),
            _ => None,
        }
    }

    /// Returns the offending field for [`ErrorKind::UnsupportedField`].
    #[must_use]
    pub fn invalid_field(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::UnsupportedField {
                field, ..
            } => Some(field.as_str()),
            _ => None,
        }
    }

    /// Builds a serializable report for API layers.
    #[must_use]
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind.name(),
            category: self.kind.category(),
            message: self.message(),
            params: self.kind.params().into_iter().collect(),
            retry_after: self.retry_after(),
        }
    }

    /// Returns a [`ErrorKind::NotFound`] error.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Returns a [`ErrorKind::NotFound`] error naming a missing secret.
    #[must_use]
    pub fn secret_not_found(secret_id: &str) -> Self {
        Self::not_found()
            .with_template(format!("Secret {} not found.", escape_template(secret_id)))
    }

    /// Returns a [`ErrorKind::Duplicate`] error.
    #[must_use]
    pub const fn duplicate() -> Self {
        Self::new(ErrorKind::Duplicate)
    }

    /// Returns a [`ErrorKind::ReadonlyProperty`] error.
    #[must_use]
    pub fn readonly_property(property: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReadonlyProperty {
            property: property.into(),
        })
    }

    /// Returns a [`ErrorKind::ReservedProperty`] error.
    #[must_use]
    pub fn reserved_property(property: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReservedProperty {
            property: property.into(),
        })
    }

    /// Returns a [`ErrorKind::InvalidObject`] error.
    #[must_use]
    pub fn invalid_object(
        schema: impl Into<String>,
        reason: impl Into<String>,
        property: Option<&str>,
    ) -> Self {
        Self::new(ErrorKind::InvalidObject {
            schema: schema.into(),
            reason: reason.into(),
            property: property.map(str::to_string),
        })
    }

    /// Returns a [`ErrorKind::SchemaLoadError`] error.
    #[must_use]
    pub fn schema_load(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaLoadError {
            reason: reason.into(),
        })
    }

    /// Returns a [`ErrorKind::DatabaseMigrationError`] error.
    #[must_use]
    pub fn migration(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::DatabaseMigrationError {
            reason: reason.into(),
        })
    }

    /// Returns a [`ErrorKind::ServerError`] error with a detailed message.
    #[must_use]
    pub fn server(detail: &str) -> Self {
        Self::new(ErrorKind::ServerError)
            .with_template(format!(
                "The request returned 500 Internal Server Error: {}",
                escape_template(detail)
            ))
    }

    /// Returns a [`ErrorKind::ClientConnectionError`] error with backing-store detail.
    #[must_use]
    pub fn client_connection(detail: &str) -> Self {
        Self::new(ErrorKind::ClientConnectionError).with_template(format!(
            "There was an error connecting to a server: {}",
            escape_template(detail)
        ))
    }
}

impl From<ErrorKind> for ServiceError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ServiceError {}

/// Serializable error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Stable kind name.
    pub kind: &'static str,
    /// Coarse category.
    pub category: ErrorCategory,
    /// Rendered message.
    pub message: String,
    /// Named parameters.
    pub params: BTreeMap<&'static str, String>,
    /// Retry-after hint for retryable kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
