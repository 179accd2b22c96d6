//! Per-cohort mutual exclusion within one process.
//!
//! Score writes hold the subject cohort guard and then the class cohort guard;
//! cohort passes and workflow updates hold only the class cohort guard. The
//! fixed order keeps two writers from deadlocking.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use gradebook_core::term::AcademicTerm;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cohort {
  /// Every student of a class in a term.
  Class { class_id: Uuid, term: AcademicTerm },
  /// Every score of one subject assignment in a term.
  Subject { subject_assignment_id: Uuid, term: AcademicTerm },
}

type Registry = Arc<Mutex<HashMap<Cohort, Arc<AsyncMutex<()>>>>>;

/// Registry of cohort guards. An entry lives only while some task holds or
/// waits for its guard.
#[derive(Debug, Default)]
pub struct CohortLocks {
  guards: Registry,
}

impl CohortLocks {
  pub fn new() -> Self { Self::default() }

  /// Wait for exclusive access to `cohort`.
  pub async fn lock(&self, cohort: Cohort) -> CohortGuard {
    let mutex = {
      let mut guards = self.guards.lock().unwrap_or_else(PoisonError::into_inner);
      guards.entry(cohort).or_default().clone()
    };
    CohortGuard {
      cohort,
      guard: Some(mutex.lock_owned().await),
      registry: self.guards.clone(),
    }
  }

  pub async fn lock_class(&self, class_id: Uuid, term: AcademicTerm) -> CohortGuard {
    self.lock(Cohort::Class { class_id, term }).await
  }

  pub async fn lock_subject(
    &self,
    subject_assignment_id: Uuid,
    term: AcademicTerm,
  ) -> CohortGuard {
    self.lock(Cohort::Subject { subject_assignment_id, term }).await
  }

  /// Number of cohorts currently held or awaited.
  pub fn tracked(&self) -> usize {
    self.guards.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

/// Exclusive access to one cohort until dropped.
#[derive(Debug)]
pub struct CohortGuard {
  cohort:   Cohort,
  guard:    Option<OwnedMutexGuard<()>>,
  registry: Registry,
}

impl Drop for CohortGuard {
  fn drop(&mut self) {
    drop(self.guard.take());
    let mut guards = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
    // Waiters clone the entry under this same lock, so a count of one means
    // nobody else can reach it.
    if guards.get(&self.cohort).is_some_and(|m| Arc::strong_count(m) == 1) {
      guards.remove(&self.cohort);
    }
  }
}
