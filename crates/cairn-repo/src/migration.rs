//! Schema migrations.
//!
//! Each [`Migration`] moves a repository from `target_version() - 1` to
//! `target_version()`. [`Migrations::run`] applies one step at a time and
//! writes the new version after each step, so an interrupted run resumes
//! from the last completed step and an already-migrated repository is left
//! alone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::backends::Backends;
use crate::error::{MigrationFailure, RepoError, RepoResult};
use crate::version::VersionStore;

/// One schema upgrade step.
pub trait Migration: Send + Sync {
    /// Version the repository is at after this step.
    fn target_version(&self) -> u64;

    fn description(&self) -> &str {
        ""
    }

    fn migrate(&self, backends: &Backends) -> Result<(), MigrationFailure>;
}

/// Registered migration steps, keyed by target version.
#[derive(Clone, Default)]
pub struct Migrations {
    steps: BTreeMap<u64, Arc<dyn Migration>>,
}

impl Migrations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step, replacing any step with the same target version.
    pub fn with(mut self, migration: impl Migration + 'static) -> Self {
        self.steps
            .insert(migration.target_version(), Arc::new(migration));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `true` if a step exists for every version in `(from, to]`.
    pub fn can_migrate(&self, from: u64, to: u64) -> bool {
        from <= to && (from + 1..=to).all(|v| self.steps.contains_key(&v))
    }

    /// Migrate from the stored version up to `to`.
    ///
    /// Re-reads the stored version before every step. Fails with
    /// `VersionMismatch` if a step is missing; nothing is changed in that
    /// case.
    pub fn run(&self, backends: &Backends, versions: &VersionStore, to: u64) -> RepoResult<()> {
        let start = versions.get()?;
        if !self.can_migrate(start, to) {
            return Err(RepoError::VersionMismatch {
                stored: start,
                expected: to,
            });
        }

        loop {
            let current = versions.get()?;
            if current >= to {
                return Ok(());
            }
            let next = current + 1;
            let step = self.steps.get(&next).ok_or(RepoError::VersionMismatch {
                stored: current,
                expected: to,
            })?;

            info!(from = current, to = next, description = step.description(), "running migration");
            step.migrate(backends).map_err(|source| RepoError::Migration {
                from: current,
                to: next,
                source,
            })?;
            versions.set(next)?;
        }
    }
}

impl fmt::Debug for Migrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrations")
            .field("targets", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}
