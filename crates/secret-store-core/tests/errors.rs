// crates/secret-store-core/tests/errors.rs
// ============================================================================
// Module: Error Taxonomy Tests
// Description: Message rendering, categories, and retry hints.
// Purpose: Keep error kinds stable for API layers that map them.
// ============================================================================

//! ## Overview
//! Checks default templates, template overrides, lenient and strict
//! rendering, kind predicates, retry-after parsing, and report serialization.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use secret_store_core::ErrorCategory;
use secret_store_core::ErrorKind;
use secret_store_core::MessageFormatError;
use secret_store_core::ServiceError;
use secret_store_core::set_strict_formatting;
use secret_store_core::strict_formatting;
use serde_json::json;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn default_templates_render_parameters() {
    let err = ServiceError::readonly_property("created_at");
    assert_eq!(err.message(), "Attribute 'created_at' is read-only.");
    assert_eq!(err.to_string(), err.message());

    let err = ServiceError::new(ErrorKind::BadAuthStrategy {
        expected: "keystone".to_string(),
        received: "noauth".to_string(),
    });
    assert_eq!(
        err.message(),
        "Incorrect auth strategy, expected \"keystone\" but received \"noauth\""
    );
    assert_eq!(ServiceError::new(ErrorKind::Generic).message(), "An unknown exception occurred");
}

#[test]
fn migration_error_appends_reason() {
    let err = ServiceError::migration("revision abc failed");
    assert_eq!(err.message(), "There was an error migrating the database: revision abc failed");
    assert_eq!(err.kind().category(), ErrorCategory::Migration);
}

#[test]
fn override_template_binds_kind_parameters() {
    let err = ServiceError::reserved_property("deleted").with_template("'{property}' is ours");
    assert_eq!(err.message(), "'deleted' is ours");
}

#[test]
fn unsatisfied_template_falls_back_to_raw_text() {
    let err = ServiceError::not_found().with_template("Secret {secret} is gone");
    assert_eq!(err.message(), "Secret {secret} is gone");
    assert_eq!(err.to_string(), "Secret {secret} is gone");
}

#[test]
fn strict_mode_reports_template_failures() {
    let err = ServiceError::not_found().with_template("Secret {secret} is gone");
    let ok = ServiceError::duplicate();

    set_strict_formatting(true);
    assert!(strict_formatting());
    let strict = err.try_message();
    let strict_ok = ok.try_message();
    let display = err.to_string();
    set_strict_formatting(false);

    assert_eq!(strict, Err(MessageFormatError::MissingParameter("secret".to_string())));
    assert_eq!(strict_ok.unwrap(), "An object with the same identifier already exists.");
    assert_eq!(display, "Secret {secret} is gone");
    assert_eq!(err.try_message().unwrap(), "Secret {secret} is gone");
}

#[test]
fn forbidden_and_invalid_predicates_follow_hierarchy() {
    assert!(ErrorKind::Forbidden.is_forbidden());
    assert!(ErrorKind::NotAuthorized.is_forbidden());
    assert!(
        ErrorKind::ProtectedImageDelete {
            image_id: "i".to_string()
        }
        .is_forbidden()
    );
    assert!(ServiceError::readonly_property("id").kind().is_forbidden());
    assert!(!ErrorKind::NotFound.is_forbidden());

    assert!(ErrorKind::InvalidSortKey.is_invalid());
    assert!(ErrorKind::InvalidFilterRangeValue.is_invalid());
    assert!(!ErrorKind::NoDataToProcess.is_invalid());
}

#[test]
fn retry_after_parses_integer_hint() {
    let limited = ServiceError::new(ErrorKind::LimitExceeded {
        body: "slow down".to_string(),
        retry: Some("30".to_string()),
    });
    assert_eq!(limited.retry_after(), Some(30));
    assert!(limited.message().contains("slow down"));

    let unavailable = ServiceError::new(ErrorKind::ServiceUnavailable {
        retry: Some(String::new()),
    });
    assert_eq!(unavailable.retry_after(), None);
    let garbled = ServiceError::new(ErrorKind::ServiceUnavailable {
        retry: Some("soon".to_string()),
    });
    assert_eq!(garbled.retry_after(), None);
    let absent = ServiceError::new(ErrorKind::ServiceUnavailable {
        retry: None,
    });
    assert_eq!(absent.retry_after(), None);
    assert_eq!(absent.kind().category(), ErrorCategory::Transient);
    assert_eq!(ServiceError::not_found().retry_after(), None);
}

#[test]
fn offending_names_are_exposed() {
    let invalid = ServiceError::invalid_object("secret_store_metadata", "too long", Some("key"));
    assert_eq!(invalid.invalid_property(), Some("key"));
    assert_eq!(invalid.invalid_field(), None);

    let unsupported = ServiceError::new(ErrorKind::UnsupportedField {
        field: "colour".to_string(),
        schema: "secret_store_metadata".to_string(),
        reason: "unknown attribute".to_string(),
    });
    assert_eq!(unsupported.invalid_field(), Some("colour"));
    assert_eq!(
        unsupported.message(),
        "No support for value set on field 'colour' on schema 'secret_store_metadata': unknown \
         attribute"
    );
}

#[test]
fn report_serializes_kind_message_and_params() {
    let report = ServiceError::reserved_property("updated_at").to_report();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(
        value,
        json!({
            "kind": "reserved_property",
            "category": "authorization",
            "message": "Attribute 'updated_at' is reserved.",
            "params": {"property": "updated_at"},
        })
    );

    let report = ServiceError::new(ErrorKind::LimitExceeded {
        body: "b".to_string(),
        retry: Some("5".to_string()),
    })
    .to_report();
    assert_eq!(report.retry_after, Some(5));
    assert_eq!(report.category, ErrorCategory::Transient);
}

#[test]
fn lookup_kinds_share_category() {
    assert_eq!(ErrorKind::NotFound.category(), ErrorCategory::Lookup);
    assert_eq!(ErrorKind::Duplicate.category(), ErrorCategory::Lookup);
    assert_eq!(ErrorKind::NoDataToProcess.category(), ErrorCategory::Validation);
    assert_eq!(ErrorKind::ServerError.category(), ErrorCategory::Transport);
}
