// orderflow/src/store/mod.rs

//! Persistence boundary. The lifecycle core never talks to a database
//! directly; it goes through an [`OrderStore`].

pub mod memory;

use crate::model::{Dispute, Order, OrderStatus, ShopperJob, ShopperJobStatus};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("record not found")]
  NotFound,

  /// The compare-and-swap token no longer matches the stored row.
  #[error("order status changed: expected {expected}, stored {actual}")]
  Conflict { expected: OrderStatus, actual: OrderStatus },

  #[error("shopper job status changed: expected {expected}, stored {actual}")]
  JobConflict {
    expected: ShopperJobStatus,
    actual: ShopperJobStatus,
  },

  #[error("record already exists")]
  Duplicate,

  #[error("store unavailable: {source}")]
  Unavailable {
    #[source]
    source: anyhow::Error,
  },
}

impl StoreError {
  pub fn unavailable(source: impl Into<anyhow::Error>) -> Self {
    StoreError::Unavailable { source: source.into() }
  }
}

/// Storage for orders, shopper jobs and disputes.
///
/// Every write that can race carries the status the caller last saw. An
/// implementation must apply the write only if the stored status still equals
/// it, atomically, and return `Conflict` otherwise. Stores without native
/// conditional updates have to emulate this (see `MemoryStore`).
#[async_trait]
pub trait OrderStore: Send + Sync {
  async fn load_order(&self, id: Uuid) -> Result<Order, StoreError>;

  /// Fails with `Duplicate` if the id or order number is taken.
  async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

  /// Conditional write; returns the stored copy.
  async fn save_order(&self, order: &Order, expected_prior_status: OrderStatus) -> Result<Order, StoreError>;

  async fn load_shopper_job(&self, order_id: Uuid) -> Result<Option<ShopperJob>, StoreError>;

  /// Fails with `Duplicate` if the order already has a job.
  async fn insert_shopper_job(&self, job: &ShopperJob) -> Result<(), StoreError>;

  async fn save_shopper_job(
    &self,
    job: &ShopperJob,
    expected_prior_status: ShopperJobStatus,
  ) -> Result<ShopperJob, StoreError>;

  /// Unclaimed jobs, oldest order first.
  async fn list_available_jobs(&self) -> Result<Vec<ShopperJob>, StoreError>;

  async fn create_dispute(&self, dispute: &Dispute) -> Result<Dispute, StoreError>;

  async fn load_dispute(&self, id: Uuid) -> Result<Dispute, StoreError>;

  async fn save_dispute(&self, dispute: &Dispute) -> Result<Dispute, StoreError>;

  async fn list_disputes(&self, order_id: Uuid) -> Result<Vec<Dispute>, StoreError>;
}
