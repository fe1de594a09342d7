// orderflow/src/store/memory.rs

use super::{OrderStore, StoreError};
use crate::model::{Dispute, Order, OrderStatus, ShopperJob, ShopperJobStatus};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{event, Level};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
  orders: HashMap<Uuid, Order>,
  jobs: HashMap<Uuid, ShopperJob>,
  disputes: HashMap<Uuid, Dispute>,
}

/// In-process store. Each conditional write checks and replaces under a
/// single write lock, so of two saves carrying the same token exactly one
/// wins.
#[derive(Default)]
pub struct MemoryStore {
  tables: RwLock<Tables>,
  offline: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes every call fail with `Unavailable` until switched back. Used to
  /// exercise the outage path.
  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  fn check_online(&self) -> Result<(), StoreError> {
    if self.offline.load(Ordering::SeqCst) {
      return Err(StoreError::unavailable(anyhow::anyhow!("memory store is offline")));
    }
    Ok(())
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn load_order(&self, id: Uuid) -> Result<Order, StoreError> {
    self.check_online()?;
    self.tables.read().orders.get(&id).cloned().ok_or(StoreError::NotFound)
  }

  async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
    self.check_online()?;
    let mut tables = self.tables.write();
    let number_taken = tables
      .orders
      .values()
      .any(|o| o.order_number() == order.order_number());
    if tables.orders.contains_key(&order.id()) || number_taken {
      return Err(StoreError::Duplicate);
    }
    tables.orders.insert(order.id(), order.clone());
    Ok(())
  }

  async fn save_order(&self, order: &Order, expected_prior_status: OrderStatus) -> Result<Order, StoreError> {
    self.check_online()?;
    let mut tables = self.tables.write();
    let stored = tables.orders.get_mut(&order.id()).ok_or(StoreError::NotFound)?;
    if stored.status() != expected_prior_status {
      event!(Level::DEBUG, order_id = %order.id(), expected = %expected_prior_status, actual = %stored.status(), "Conditional order write rejected.");
      return Err(StoreError::Conflict {
        expected: expected_prior_status,
        actual: stored.status(),
      });
    }
    *stored = order.clone();
    Ok(stored.clone())
  }

  async fn load_shopper_job(&self, order_id: Uuid) -> Result<Option<ShopperJob>, StoreError> {
    self.check_online()?;
    Ok(self.tables.read().jobs.get(&order_id).cloned())
  }

  async fn insert_shopper_job(&self, job: &ShopperJob) -> Result<(), StoreError> {
    self.check_online()?;
    let mut tables = self.tables.write();
    if tables.jobs.contains_key(&job.order_id) {
      return Err(StoreError::Duplicate);
    }
    tables.jobs.insert(job.order_id, job.clone());
    Ok(())
  }

  async fn save_shopper_job(
    &self,
    job: &ShopperJob,
    expected_prior_status: ShopperJobStatus,
  ) -> Result<ShopperJob, StoreError> {
    self.check_online()?;
    let mut tables = self.tables.write();
    let stored = tables.jobs.get_mut(&job.order_id).ok_or(StoreError::NotFound)?;
    if stored.status != expected_prior_status {
      return Err(StoreError::JobConflict {
        expected: expected_prior_status,
        actual: stored.status,
      });
    }
    *stored = job.clone();
    Ok(stored.clone())
  }

  async fn list_available_jobs(&self) -> Result<Vec<ShopperJob>, StoreError> {
    self.check_online()?;
    let tables = self.tables.read();
    let mut jobs: Vec<(ShopperJob, chrono::DateTime<chrono::Utc>)> = tables
      .jobs
      .values()
      .filter(|job| job.is_claimable())
      .filter_map(|job| {
        tables
          .orders
          .get(&job.order_id)
          .filter(|order| !order.status().is_terminal())
          .map(|order| (job.clone(), order.created_at()))
      })
      .collect();
    jobs.sort_by_key(|(_, created_at)| *created_at);
    Ok(jobs.into_iter().map(|(job, _)| job).collect())
  }

  async fn create_dispute(&self, dispute: &Dispute) -> Result<Dispute, StoreError> {
    self.check_online()?;
    let mut tables = self.tables.write();
    if tables.disputes.contains_key(&dispute.id) {
      return Err(StoreError::Duplicate);
    }
    tables.disputes.insert(dispute.id, dispute.clone());
    Ok(dispute.clone())
  }

  async fn load_dispute(&self, id: Uuid) -> Result<Dispute, StoreError> {
    self.check_online()?;
    self.tables.read().disputes.get(&id).cloned().ok_or(StoreError::NotFound)
  }

  async fn save_dispute(&self, dispute: &Dispute) -> Result<Dispute, StoreError> {
    self.check_online()?;
    let mut tables = self.tables.write();
    let stored = tables.disputes.get_mut(&dispute.id).ok_or(StoreError::NotFound)?;
    *stored = dispute.clone();
    Ok(stored.clone())
  }

  async fn list_disputes(&self, order_id: Uuid) -> Result<Vec<Dispute>, StoreError> {
    self.check_online()?;
    let tables = self.tables.read();
    let mut disputes: Vec<Dispute> = tables
      .disputes
      .values()
      .filter(|d| d.order_id == order_id)
      .cloned()
      .collect();
    disputes.sort_by_key(|d| d.created_at);
    Ok(disputes)
  }
}
