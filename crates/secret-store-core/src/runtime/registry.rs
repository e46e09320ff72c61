// crates/secret-store-core/src/runtime/registry.rs
// ============================================================================
// Module: Schema Registry
// Description: Resolves migration back-pointers into a forward chain.
// Purpose: Reject broken chains before any migration touches a store.
// Dependencies: crate::core, crate::errors
// ============================================================================

//! ## Overview
//! Steps are authored with a pointer to their predecessor. The registry
//! turns those pointers into a single ordered chain from the root to the
//! head and fails with [`ErrorKind::SchemaLoadError`] when the pointers do
//! not describe exactly one linear history.
//!
//! [`ErrorKind::SchemaLoadError`]: crate::ErrorKind::SchemaLoadError

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::MigrationStep;
use crate::core::Revision;
use crate::core::RevisionTarget;
use crate::errors::ServiceError;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Ordered, immutable chain of migration steps.
///
/// # Invariants
/// - `steps[0]` is the only step without a predecessor.
/// - `steps[i].down_revision == Some(steps[i - 1].revision)` for `i > 0`.
/// - Revisions are unique.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    /// Steps from root to head.
    steps: Vec<MigrationStep>,
    /// Position of each revision in `steps`.
    positions: BTreeMap<Revision, usize>,
}

impl SchemaRegistry {
    /// Builds the forward chain from steps given in any order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::SchemaLoadError`] when the list is empty,
    /// a revision repeats, there is not exactly one root, a predecessor does
    /// not resolve, two steps share a predecessor, or the pointers form a cycle.
    pub fn load(steps: Vec<MigrationStep>) -> Result<Self, ServiceError> {
        if steps.is_empty() {
            return Err(ServiceError::schema_load("no migration steps defined"));
        }
        let mut by_revision: BTreeMap<Revision, MigrationStep> = BTreeMap::new();
        for step in steps {
            if step.revision.as_str().is_empty() {
                return Err(ServiceError::schema_load("revision id must not be empty"));
            }
            if by_revision.contains_key(&step.revision) {
                return Err(ServiceError::schema_load(format!(
                    "duplicate revision {}",
                    step.revision
                )));
            }
            by_revision.insert(step.revision.clone(), step);
        }

        let mut root: Option<Revision> = None;
        let mut successors: BTreeMap<Revision, Revision> = BTreeMap::new();
        for step in by_revision.values() {
            let Some(parent) = &step.down_revision else {
                if let Some(existing) = &root {
                    return Err(ServiceError::schema_load(format!(
                        "multiple root revisions: {existing} and {}",
                        step.revision
                    )));
                }
                root = Some(step.revision.clone());
                continue;
            };
            if !by_revision.contains_key(parent) {
                return Err(ServiceError::schema_load(format!(
                    "revision {} references unknown down_revision {parent}",
                    step.revision
                )));
            }
            if let Some(sibling) = successors.insert(parent.clone(), step.revision.clone()) {
                return Err(ServiceError::schema_load(format!(
                    "revisions {sibling} and {} both revise {parent}",
                    step.revision
                )));
            }
        }
        let Some(root) = root else {
            return Err(ServiceError::schema_load(
                "no root revision; down_revision pointers form a cycle",
            ));
        };

        let total = by_revision.len();
        let mut ordered = Vec::with_capacity(total);
        let mut cursor = Some(root);
        while let Some(revision) = cursor {
            if ordered.len() == total {
                break;
            }
            cursor = successors.get(&revision).cloned();
            if let Some(step) = by_revision.remove(&revision) {
                ordered.push(step);
            }
        }
        if !by_revision.is_empty() {
            let stranded: Vec<&str> = by_revision.keys().map(Revision::as_str).collect();
            return Err(ServiceError::schema_load(format!(
                "cycle detected among revisions: {}",
                stranded.join(", ")
            )));
        }

        let positions = ordered
            .iter()
            .enumerate()
            .map(|(index, step)| (step.revision.clone(), index))
            .collect();
        Ok(Self {
            steps: ordered,
            positions,
        })
    }

    /// Returns the steps from root to head.
    #[must_use]
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true when the registry holds no steps. Never true after [`SchemaRegistry::load`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the root step.
    #[must_use]
    pub fn root(&self) -> Option<&MigrationStep> {
        self.steps.first()
    }

    /// Returns the head step.
    #[must_use]
    pub fn head(&self) -> Option<&MigrationStep> {
        self.steps.last()
    }

    /// Looks up a step by revision.
    #[must_use]
    pub fn get(&self, revision: &Revision) -> Option<&MigrationStep> {
        self.position(revision).and_then(|index| self.steps.get(index))
    }

    /// Returns the zero-based chain position of `revision`.
    #[must_use]
    pub fn position(&self, revision: &Revision) -> Option<usize> {
        self.positions.get(revision).copied()
    }

    /// Returns how many steps are applied when the schema sits at `revision`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::DatabaseMigrationError`] when the revision
    /// is not part of the chain.
    pub fn applied_count(&self, revision: Option<&Revision>) -> Result<usize, ServiceError> {
        match revision {
            None => Ok(0),
            Some(revision) => self.position(revision).map(|index| index + 1).ok_or_else(|| {
                ServiceError::migration(format!(
                    "revision {revision} is not part of the migration chain"
                ))
            }),
        }
    }

    /// Returns how many steps are applied at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::DatabaseMigrationError`] for unknown revisions.
    pub fn target_count(&self, target: &RevisionTarget) -> Result<usize, ServiceError> {
        match target {
            RevisionTarget::Base => Ok(0),
            RevisionTarget::Head => Ok(self.steps.len()),
            RevisionTarget::Revision(revision) => self.applied_count(Some(revision)),
        }
    }

    /// Returns the revision in effect after `count` steps.
    #[must_use]
    pub fn revision_at(&self, count: usize) -> Option<&Revision> {
        count.checked_sub(1).and_then(|index| self.steps.get(index)).map(|step| &step.revision)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
