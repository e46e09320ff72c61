// crates/secret-store-core/src/runtime/executor.rs
// ============================================================================
// Module: Migration Executor
// Description: Walks the schema registry chain against a migration target.
// Purpose: Apply or revert schema revisions exactly once, in chain order.
// Dependencies: crate::audit, crate::core, crate::errors, crate::interfaces, serde
// ============================================================================

//! ## Overview
//! The executor moves a [`MigrationTarget`] between revisions one step at a
//! time. Each step runs in its own exclusive session that re-reads the
//! applied revision before acting, so executors racing on a shared store
//! never apply the same step twice: the loser finds the work done and stops.
//!
//! A failed step is rolled back by the target and surfaces as
//! [`ErrorKind::DatabaseMigrationError`]; the remaining chain is not
//! attempted and earlier steps stay applied. The executor never retries.
//!
//! [`ErrorKind::DatabaseMigrationError`]: crate::ErrorKind::DatabaseMigrationError

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Serialize;

use crate::audit::AuditSink;
use crate::audit::MigrationAuditEvent;
use crate::core::Direction;
use crate::core::MigrationStep;
use crate::core::Revision;
use crate::core::RevisionTarget;
use crate::core::StepOutcome;
use crate::errors::ErrorKind;
use crate::errors::ServiceError;
use crate::interfaces::MigrationTarget;
use crate::interfaces::SchemaSession;
use crate::runtime::registry::SchemaRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Serializes migration runs within the process.
static MIGRATION_LOCK: Mutex<()> = Mutex::new(());

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Result of one applied or reverted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step revision.
    pub revision: Revision,
    /// Step description.
    pub description: String,
    /// Structural changes.
    pub outcome: StepOutcome,
}

/// Result of an upgrade or downgrade run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Direction of the run.
    pub direction: Direction,
    /// Applied revision before the run.
    pub from: Option<Revision>,
    /// Applied revision after the run.
    pub to: Option<Revision>,
    /// Steps this executor ran, in order.
    pub applied: Vec<StepReport>,
}

impl MigrationReport {
    /// Returns true when the run changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// One line of migration history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Step revision.
    pub revision: Revision,
    /// Predecessor revision.
    pub down_revision: Option<Revision>,
    /// Step description.
    pub description: String,
    /// Whether the live schema includes this step.
    pub applied: bool,
    /// Whether this is the live schema revision.
    pub current: bool,
    /// Whether this is the latest step.
    pub head: bool,
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Applies registry steps to a target.
#[derive(Clone)]
pub struct MigrationExecutor {
    /// Chain of steps.
    registry: Arc<SchemaRegistry>,
    /// Store being migrated.
    target: Arc<dyn MigrationTarget>,
    /// Audit sink for step events.
    audit: Arc<dyn AuditSink>,
}

impl MigrationExecutor {
    /// Creates an executor for `target`.
    #[must_use]
    pub fn new(
        registry: Arc<SchemaRegistry>,
        target: Arc<dyn MigrationTarget>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            target,
            audit,
        }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Returns the applied revision.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the applied state cannot be read or is
    /// not part of the chain.
    pub fn current(&self) -> Result<Option<Revision>, ServiceError> {
        let current = self.target.applied_revision().map_err(into_migration_error)?;
        self.registry.applied_count(current.as_ref())?;
        Ok(current)
    }

    /// Returns true when every step is applied.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the applied state cannot be read.
    pub fn is_at_head(&self) -> Result<bool, ServiceError> {
        let current = self.current()?;
        Ok(current.as_ref() == self.registry.head().map(|step| &step.revision))
    }

    /// Lists every step with its applied state.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the applied state cannot be read.
    pub fn history(&self) -> Result<Vec<HistoryEntry>, ServiceError> {
        let current = self.current()?;
        let applied = self.registry.applied_count(current.as_ref())?;
        let last = self.registry.len().saturating_sub(1);
        Ok(self
            .registry
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| HistoryEntry {
                revision: step.revision.clone(),
                down_revision: step.down_revision.clone(),
                description: step.description.clone(),
                applied: index < applied,
                current: index + 1 == applied,
                head: index == last,
            })
            .collect())
    }

    /// Applies every step after the current revision up to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::DatabaseMigrationError`] when the target is
    /// unknown or behind the current revision, or when a step fails.
    pub fn upgrade_to(&self, target: &RevisionTarget) -> Result<MigrationReport, ServiceError> {
        self.run(target, Direction::Upgrade)
    }

    /// Reverts every step after `target` down to the current revision.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::DatabaseMigrationError`] when the target is
    /// unknown or ahead of the current revision, or when a step fails.
    pub fn downgrade_to(&self, target: &RevisionTarget) -> Result<MigrationReport, ServiceError> {
        self.run(target, Direction::Downgrade)
    }

    /// Drives the target toward `target` one step per exclusive session.
    fn run(
        &self,
        target: &RevisionTarget,
        direction: Direction,
    ) -> Result<MigrationReport, ServiceError> {
        let _guard = MIGRATION_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let goal = self.registry.target_count(target)?;
        let from = self.current()?;
        let start = self.registry.applied_count(from.as_ref())?;
        match direction {
            Direction::Upgrade if goal < start => {
                return Err(ServiceError::migration(format!(
                    "upgrade target {target} is behind the current revision {}",
                    display_revision(from.as_ref())
                )));
            }
            Direction::Downgrade if goal > start => {
                return Err(ServiceError::migration(format!(
                    "downgrade target {target} is ahead of the current revision {}",
                    display_revision(from.as_ref())
                )));
            }
            _ => {}
        }

        let mut applied = Vec::new();
        while let Some(report) = self.run_one(goal, direction)? {
            applied.push(report);
        }
        let to = self.current()?;
        Ok(MigrationReport {
            direction,
            from,
            to,
            applied,
        })
    }

    /// Runs the next step toward `goal`, or returns `None` when already there.
    fn run_one(
        &self,
        goal: usize,
        direction: Direction,
    ) -> Result<Option<StepReport>, ServiceError> {
        let registry = self.registry.as_ref();
        let mut attempted: Option<usize> = None;
        let mut completed: Option<StepOutcome> = None;
        let result = self.target.with_exclusive_session(&mut |session: &mut dyn SchemaSession| {
            let current = session.applied_revision()?;
            let level = registry.applied_count(current.as_ref())?;
            let index = match direction {
                Direction::Upgrade if level < goal => level,
                Direction::Downgrade if level > goal => level - 1,
                _ => return Ok(()),
            };
            let Some(step) = registry.steps().get(index) else {
                return Ok(());
            };
            attempted = Some(index);
            let outcome = match direction {
                Direction::Upgrade => {
                    let outcome = step.upgrade(session)?;
                    session.set_applied_revision(Some(&step.revision))?;
                    outcome
                }
                Direction::Downgrade => {
                    let outcome = step.downgrade(session)?;
                    session.set_applied_revision(step.down_revision.as_ref())?;
                    outcome
                }
            };
            completed = Some(outcome);
            Ok(())
        });

        let attempted = attempted.and_then(|index| registry.steps().get(index));
        match (result, attempted) {
            (Err(err), Some(step)) => {
                let err = step_failure(step, direction, &err);
                self.audit.record_migration(&MigrationAuditEvent::failed(step, direction, &err));
                Err(err)
            }
            (Err(err), None) => Err(into_migration_error(err)),
            (Ok(()), Some(step)) => {
                let outcome = completed.unwrap_or_default();
                self.audit.record_migration(&MigrationAuditEvent::completed(
                    step, direction, &outcome,
                ));
                Ok(Some(StepReport {
                    revision: step.revision.clone(),
                    description: step.description.clone(),
                    outcome,
                }))
            }
            (Ok(()), None) => Ok(None),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Wraps a step failure as a migration error naming the revision.
fn step_failure(step: &MigrationStep, direction: Direction, err: &ServiceError) -> ServiceError {
    let verb = match direction {
        Direction::Upgrade => "upgrade",
        Direction::Downgrade => "downgrade",
    };
    ServiceError::migration(format!(
        "{verb} of revision {} ({}) failed: {}",
        step.revision,
        step.description,
        err.message()
    ))
}

/// Converts any error into a migration error, keeping existing ones intact.
fn into_migration_error(err: ServiceError) -> ServiceError {
    if matches!(err.kind(), ErrorKind::DatabaseMigrationError { .. }) {
        err
    } else {
        ServiceError::migration(err.message())
    }
}

/// Renders an optional revision, using `base` for none.
fn display_revision(revision: Option<&Revision>) -> String {
    revision.map_or_else(|| "base".to_string(), ToString::to_string)
}
