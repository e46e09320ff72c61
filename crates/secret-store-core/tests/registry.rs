// crates/secret-store-core/tests/registry.rs
// ============================================================================
// Module: Schema Registry Tests
// Description: Chain resolution and load-failure coverage for the registry.
// Purpose: Ensure broken revision graphs are rejected before any migration.
// ============================================================================

//! ## Overview
//! Covers chain ordering from shuffled input and every `SchemaLoadError`
//! cause: empty list, duplicates, dangling pointers, branches, and cycles.

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

use proptest::prelude::*;
use secret_store_core::ErrorKind;
use secret_store_core::MigrationStep;
use secret_store_core::Revision;
use secret_store_core::RevisionTarget;
use secret_store_core::SchemaRegistry;
use secret_store_core::ServiceError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn linear_chain(length: usize) -> Vec<MigrationStep> {
    (0 .. length)
        .map(|index| {
            let revision = format!("rev{index:03}");
            let parent = index.checked_sub(1).map(|prev| format!("rev{prev:03}"));
            MigrationStep::new(&revision, parent.as_deref(), &format!("step {index}"))
        })
        .collect()
}

fn load_error_reason(steps: Vec<MigrationStep>) -> String {
    let err: ServiceError = SchemaRegistry::load(steps).unwrap_err();
    match err.kind() {
        ErrorKind::SchemaLoadError {
            reason,
        } => reason.clone(),
        other => panic!("expected schema load error, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn registry_orders_steps_from_root_to_head() {
    let mut steps = linear_chain(3);
    steps.reverse();
    let registry = SchemaRegistry::load(steps).unwrap();

    let order: Vec<&str> = registry.steps().iter().map(|step| step.revision.as_str()).collect();
    assert_eq!(order, vec!["rev000", "rev001", "rev002"]);
    assert_eq!(registry.root().unwrap().revision, Revision::new("rev000"));
    assert_eq!(registry.head().unwrap().revision, Revision::new("rev002"));
    assert_eq!(registry.position(&Revision::new("rev001")), Some(1));
    assert_eq!(registry.get(&Revision::new("rev002")).unwrap().description, "step 2");
    assert!(registry.get(&Revision::new("missing")).is_none());
}

#[test]
fn registry_rejects_empty_list() {
    assert!(load_error_reason(Vec::new()).contains("no migration steps"));
}

#[test]
fn registry_rejects_duplicate_revision() {
    let steps = vec![
        MigrationStep::new("a", None, "first"),
        MigrationStep::new("a", None, "again"),
    ];
    assert!(load_error_reason(steps).contains("duplicate revision a"));
}

#[test]
fn registry_rejects_multiple_roots() {
    let steps = vec![MigrationStep::new("a", None, "one"), MigrationStep::new("b", None, "two")];
    assert!(load_error_reason(steps).contains("multiple root revisions"));
}

#[test]
fn registry_rejects_unknown_down_revision() {
    let steps = vec![
        MigrationStep::new("a", None, "root"),
        MigrationStep::new("b", Some("ghost"), "orphan"),
    ];
    assert!(load_error_reason(steps).contains("unknown down_revision ghost"));
}

#[test]
fn registry_rejects_branches() {
    let steps = vec![
        MigrationStep::new("a", None, "root"),
        MigrationStep::new("b", Some("a"), "left"),
        MigrationStep::new("c", Some("a"), "right"),
    ];
    assert!(load_error_reason(steps).contains("both revise a"));
}

#[test]
fn registry_rejects_cycle_without_root() {
    let steps = vec![
        MigrationStep::new("a", Some("b"), "one"),
        MigrationStep::new("b", Some("a"), "two"),
    ];
    assert!(load_error_reason(steps).contains("no root revision"));
}

#[test]
fn registry_rejects_cycle_beside_chain() {
    let steps = vec![
        MigrationStep::new("root", None, "root"),
        MigrationStep::new("x", Some("y"), "loop one"),
        MigrationStep::new("y", Some("x"), "loop two"),
    ];
    let reason = load_error_reason(steps);
    assert!(reason.contains("cycle detected"));
    assert!(reason.contains('x') && reason.contains('y'));
}

#[test]
fn registry_rejects_empty_revision() {
    let steps = vec![MigrationStep::new("", None, "nameless")];
    assert!(load_error_reason(steps).contains("must not be empty"));
}

#[test]
fn target_count_rejects_unknown_revision() {
    let registry = SchemaRegistry::load(linear_chain(2)).unwrap();
    let err = registry.target_count(&RevisionTarget::Revision(Revision::new("nope"))).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DatabaseMigrationError { .. }));
    assert_eq!(registry.target_count(&RevisionTarget::Base).unwrap(), 0);
}

#[test]
fn revision_target_parses_keywords() {
    assert_eq!("base".parse::<RevisionTarget>().unwrap(), RevisionTarget::Base);
    assert_eq!(" head ".parse::<RevisionTarget>().unwrap(), RevisionTarget::Head);
    assert_eq!(
        "13d127569afa".parse::<RevisionTarget>().unwrap(),
        RevisionTarget::Revision(Revision::new("13d127569afa"))
    );
    assert!("".parse::<RevisionTarget>().is_err());
}

proptest! {
    #[test]
    fn registry_order_is_independent_of_input_order(
        length in 1usize .. 12,
        seed in any::<u64>(),
    ) {
        let mut steps = linear_chain(length);
        // Deterministic Fisher-Yates driven by the seed.
        let mut state = seed;
        for index in (1 .. steps.len()).rev() {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let swap = usize::try_from(state >> 33).unwrap() % (index + 1);
            steps.swap(index, swap);
        }
        let registry = SchemaRegistry::load(steps).unwrap();
        prop_assert_eq!(registry.len(), length);
        for (index, step) in registry.steps().iter().enumerate() {
            prop_assert_eq!(step.revision.as_str(), format!("rev{index:03}"));
            if index > 0 {
                let expected = format!("rev{:03}", index - 1);
                prop_assert_eq!(step.down_revision.as_ref().map(Revision::as_str), Some(expected.as_str()));
            }
        }
    }

    #[test]
    fn registry_rejects_any_dropped_link(length in 3usize .. 10, dropped in 1usize .. 9) {
        let mut steps = linear_chain(length);
        let dropped = dropped % (length - 1) + 1;
        steps.remove(dropped);
        if dropped == length - 1 {
            prop_assert!(SchemaRegistry::load(steps).is_ok());
        } else {
            let err = SchemaRegistry::load(steps).unwrap_err();
            let is_load_error = matches!(err.kind(), ErrorKind::SchemaLoadError { .. });
            prop_assert!(is_load_error);
        }
    }
}
