pub mod error;

pub use error::{ModelError, Result};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// None of the crate's critical sections run user code while a lock is held,
/// so a poisoned mutex still guards consistent state.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
