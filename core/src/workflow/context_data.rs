// orderflow/src/workflow/context_data.rs

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared, lockable state handed to every step handler of a workflow run.
///
/// Cloning is cheap (it clones the `Arc`), so each handler gets its own handle
/// to the same underlying data.
///
/// IMPORTANT: the guards are blocking `parking_lot` guards. Drop them before any
/// `.await`; a handler that holds a guard across a suspension point can
/// deadlock the next handler of the same run.
#[derive(Debug)]
pub struct ContextData<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> ContextData<T> {
  pub fn new(data: T) -> Self {
    ContextData(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  /// Runs `f` under a read lock and returns its result, releasing the lock
  /// before returning. Handy for copying a few fields out before an `.await`.
  pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
    f(&self.0.read())
  }

  /// Same as [`ContextData::with`] but under a write lock.
  pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    f(&mut self.0.write())
  }
}

impl<T: Send + Sync + Clone + 'static> ContextData<T> {
  /// Copies the current value out of the lock.
  pub fn snapshot(&self) -> T {
    self.0.read().clone()
  }
}

impl<T: Send + Sync + 'static> Clone for ContextData<T> {
  fn clone(&self) -> Self {
    ContextData(Arc::clone(&self.0))
  }
}
