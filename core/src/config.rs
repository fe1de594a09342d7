// orderflow/src/config.rs

use crate::model::FeePolicy;

/// Tunables of the lifecycle manager.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
  pub fees: FeePolicy,
  /// How often a job claim or a dispute re-reads the order after losing a
  /// race for it before giving up with `StaleState`.
  pub stale_retry_limit: u32,
}

impl Default for LifecycleConfig {
  fn default() -> Self {
    Self {
      fees: FeePolicy::default(),
      stale_retry_limit: 3,
    }
  }
}
