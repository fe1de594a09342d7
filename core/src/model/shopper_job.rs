// orderflow/src/model/shopper_job.rs

use crate::model::order::{Order, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopperJobStatus {
  Available,
  Accepted,
  InProgress,
  ReadyForDelivery,
  Completed,
}

impl ShopperJobStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ShopperJobStatus::Available => "available",
      ShopperJobStatus::Accepted => "accepted",
      ShopperJobStatus::InProgress => "in_progress",
      ShopperJobStatus::ReadyForDelivery => "ready_for_delivery",
      ShopperJobStatus::Completed => "completed",
    }
  }
}

impl fmt::Display for ShopperJobStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ShopperJobStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "available" => Ok(ShopperJobStatus::Available),
      "accepted" => Ok(ShopperJobStatus::Accepted),
      "in_progress" => Ok(ShopperJobStatus::InProgress),
      "ready_for_delivery" => Ok(ShopperJobStatus::ReadyForDelivery),
      "completed" => Ok(ShopperJobStatus::Completed),
      other => Err(format!("unknown shopper job status '{}'", other)),
    }
  }
}

/// At most one per order, keyed by `order_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopperJob {
  pub order_id: Uuid,
  pub shopper_id: Option<Uuid>,
  pub status: ShopperJobStatus,
  pub proof_url: Option<String>,
  pub commission_cents: i64,
  pub accepted_at: Option<DateTime<Utc>>,
  pub picked_up_at: Option<DateTime<Utc>>,
  pub delivered_at: Option<DateTime<Utc>>,
}

impl ShopperJob {
  /// An unclaimed job paying the order's shopper fee.
  pub fn for_order(order: &Order) -> Self {
    Self {
      order_id: order.id(),
      shopper_id: None,
      status: ShopperJobStatus::Available,
      proof_url: None,
      commission_cents: order.shopper_fee_cents(),
      accepted_at: None,
      picked_up_at: None,
      delivered_at: None,
    }
  }

  pub fn is_claimable(&self) -> bool {
    self.status == ShopperJobStatus::Available && self.shopper_id.is_none()
  }

  pub(crate) fn accept(&mut self, shopper_id: Uuid, now: DateTime<Utc>) {
    self.shopper_id = Some(shopper_id);
    self.status = ShopperJobStatus::Accepted;
    self.accepted_at = Some(now);
  }

  /// Accepted by `shopper_id` but not yet moved past acceptance.
  pub fn is_held_by(&self, shopper_id: Uuid) -> bool {
    self.status == ShopperJobStatus::Accepted && self.shopper_id == Some(shopper_id)
  }

  /// Back to an unclaimed job, as before [`accept`](Self::accept).
  pub(crate) fn release(&mut self) {
    self.shopper_id = None;
    self.status = ShopperJobStatus::Available;
    self.accepted_at = None;
  }

  /// Mirrors an order move onto the job. Returns false when the order status
  /// has no job-side counterpart.
  pub(crate) fn follow_order(&mut self, to: OrderStatus, now: DateTime<Utc>) -> bool {
    match to {
      OrderStatus::PickedUp => {
        self.status = ShopperJobStatus::InProgress;
        self.picked_up_at = Some(now);
      }
      OrderStatus::Inspecting => {
        self.status = ShopperJobStatus::ReadyForDelivery;
        self.delivered_at = Some(now);
      }
      OrderStatus::Completed => self.status = ShopperJobStatus::Completed,
      _ => return false,
    }
    true
  }
}
