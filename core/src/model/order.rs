// orderflow/src/model/order.rs

use crate::error::LifecycleError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Pending,
  Accepted,
  Preparing,
  Ready,
  PickedUp,
  Inspecting,
  Approved,
  Completed,
  Disputed,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 10] = [
    OrderStatus::Pending,
    OrderStatus::Accepted,
    OrderStatus::Preparing,
    OrderStatus::Ready,
    OrderStatus::PickedUp,
    OrderStatus::Inspecting,
    OrderStatus::Approved,
    OrderStatus::Completed,
    OrderStatus::Disputed,
    OrderStatus::Cancelled,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Accepted => "accepted",
      OrderStatus::Preparing => "preparing",
      OrderStatus::Ready => "ready",
      OrderStatus::PickedUp => "picked_up",
      OrderStatus::Inspecting => "inspecting",
      OrderStatus::Approved => "approved",
      OrderStatus::Completed => "completed",
      OrderStatus::Disputed => "disputed",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
  }

  /// Position on the forward path `pending < ... < completed`. The side
  /// branches (`disputed`, `cancelled`) have no rank.
  pub fn forward_rank(&self) -> Option<u8> {
    match self {
      OrderStatus::Pending => Some(0),
      OrderStatus::Accepted => Some(1),
      OrderStatus::Preparing => Some(2),
      OrderStatus::Ready => Some(3),
      OrderStatus::PickedUp => Some(4),
      OrderStatus::Inspecting => Some(5),
      OrderStatus::Approved => Some(6),
      OrderStatus::Completed => Some(7),
      OrderStatus::Disputed | OrderStatus::Cancelled => None,
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    OrderStatus::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| format!("unknown order status '{}'", s))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
}

impl InspectionStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      InspectionStatus::Pending => "pending",
      InspectionStatus::Approved => "approved",
      InspectionStatus::Rejected => "rejected",
    }
  }
}

impl fmt::Display for InspectionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for InspectionStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(InspectionStatus::Pending),
      "approved" => Ok(InspectionStatus::Approved),
      "rejected" => Ok(InspectionStatus::Rejected),
      other => Err(format!("unknown inspection status '{}'", other)),
    }
  }
}

/// A line of an order. `product_name` is a snapshot taken at order time and
/// is never refreshed from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
  pub product_id: Uuid,
  pub product_name: String,
  pub quantity: u32,
  pub unit_price_cents: i64,
}

impl OrderItem {
  pub fn new(product_id: Uuid, product_name: impl Into<String>, quantity: u32, unit_price_cents: i64) -> Self {
    Self {
      product_id,
      product_name: product_name.into(),
      quantity,
      unit_price_cents,
    }
  }

  /// Always derived; a stored line total is never trusted. Saturates instead
  /// of wrapping for lines edited past what [`Order::create`] accepts.
  pub fn total_price_cents(&self) -> i64 {
    self.checked_total_price_cents().unwrap_or(i64::MAX)
  }

  pub fn checked_total_price_cents(&self) -> Option<i64> {
    i64::from(self.quantity).checked_mul(self.unit_price_cents)
  }
}

/// Shopper fee as a basis-point share of the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
  pub shopper_fee_bps: u32,
}

impl FeePolicy {
  pub fn new(shopper_fee_bps: u32) -> Self {
    Self { shopper_fee_bps }
  }

  /// Rounded half-up to the cent. `None` when the subtotal is too large to
  /// price.
  pub fn shopper_fee_cents(&self, subtotal_cents: i64) -> Option<i64> {
    let scaled = subtotal_cents
      .checked_mul(i64::from(self.shopper_fee_bps))?
      .checked_add(5_000)?;
    Some(scaled / 10_000)
  }
}

impl Default for FeePolicy {
  fn default() -> Self {
    // 10 %
    Self { shopper_fee_bps: 1_000 }
  }
}

/// Checkout input for [`Order::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
  pub consumer_id: Uuid,
  pub vendor_id: Uuid,
  pub items: Vec<OrderItem>,
  #[serde(default)]
  pub special_instructions: Option<String>,
  #[serde(default)]
  pub order_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  id: Uuid,
  order_number: String,
  status: OrderStatus,
  inspection_status: InspectionStatus,
  proof_of_purchase_ref: Option<String>,
  all_items_confirmed: bool,
  pub consumer_id: Uuid,
  pub vendor_id: Uuid,
  shopper_id: Option<Uuid>,
  /// Editable snapshot of the lines. Editing it never touches the totals.
  pub items: Vec<OrderItem>,
  subtotal_cents: i64,
  shopper_fee_cents: i64,
  total_cents: i64,
  pub special_instructions: Option<String>,
  inspection_notes: Option<String>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl Order {
  /// Validates the checkout input and fixes the amounts for the life of the order.
  pub fn create(input: NewOrder, fees: &FeePolicy, now: DateTime<Utc>) -> Result<Self, LifecycleError> {
    if input.items.is_empty() {
      return Err(LifecycleError::InvalidOrder("an order needs at least one item".to_string()));
    }
    for item in &input.items {
      if item.quantity == 0 {
        return Err(LifecycleError::InvalidOrder(format!(
          "quantity of '{}' must be greater than zero",
          item.product_name
        )));
      }
      if item.unit_price_cents <= 0 {
        return Err(LifecycleError::InvalidOrder(format!(
          "unit price of '{}' must be greater than zero",
          item.product_name
        )));
      }
      if item.product_name.trim().is_empty() {
        return Err(LifecycleError::InvalidOrder("every item needs a product name".to_string()));
      }
    }

    let out_of_range = || LifecycleError::InvalidOrder("order amount out of range".to_string());
    let subtotal_cents = input
      .items
      .iter()
      .try_fold(0_i64, |sum, item| sum.checked_add(item.checked_total_price_cents()?))
      .ok_or_else(out_of_range)?;
    let shopper_fee_cents = fees.shopper_fee_cents(subtotal_cents).ok_or_else(out_of_range)?;
    let total_cents = subtotal_cents.checked_add(shopper_fee_cents).ok_or_else(out_of_range)?;
    let id = Uuid::new_v4();
    let order_number = match input.order_number {
      Some(number) if !number.trim().is_empty() => number,
      _ => display_number(id, now),
    };

    Ok(Self {
      id,
      order_number,
      status: OrderStatus::Pending,
      inspection_status: InspectionStatus::Pending,
      proof_of_purchase_ref: None,
      all_items_confirmed: false,
      consumer_id: input.consumer_id,
      vendor_id: input.vendor_id,
      shopper_id: None,
      items: input.items,
      subtotal_cents,
      shopper_fee_cents,
      total_cents,
      special_instructions: input.special_instructions,
      inspection_notes: None,
      created_at: now,
      updated_at: now,
    })
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn order_number(&self) -> &str {
    &self.order_number
  }

  pub fn status(&self) -> OrderStatus {
    self.status
  }

  pub fn inspection_status(&self) -> InspectionStatus {
    self.inspection_status
  }

  pub fn proof_of_purchase_ref(&self) -> Option<&str> {
    self.proof_of_purchase_ref.as_deref()
  }

  pub fn all_items_confirmed(&self) -> bool {
    self.all_items_confirmed
  }

  /// Set only by a successful job claim.
  pub fn shopper_id(&self) -> Option<Uuid> {
    self.shopper_id
  }

  pub fn inspection_notes(&self) -> Option<&str> {
    self.inspection_notes.as_deref()
  }

  pub fn subtotal_cents(&self) -> i64 {
    self.subtotal_cents
  }

  pub fn shopper_fee_cents(&self) -> i64 {
    self.shopper_fee_cents
  }

  pub fn total_cents(&self) -> i64 {
    self.total_cents
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }

  pub fn has_own_evidence(&self) -> bool {
    self.proof_of_purchase_ref.is_some() || self.all_items_confirmed
  }

  /// Only called once the policy has approved the move.
  pub(crate) fn apply_transition(&mut self, to: OrderStatus, now: DateTime<Utc>) {
    self.status = to;
    self.touch(now);
  }

  pub(crate) fn attach_proof(&mut self, reference: String, now: DateTime<Utc>) {
    self.proof_of_purchase_ref = Some(reference);
    self.touch(now);
  }

  pub(crate) fn confirm_all_items(&mut self, now: DateTime<Utc>) {
    self.all_items_confirmed = true;
    self.touch(now);
  }

  /// Inspection lives on its own axis: this never moves `status`.
  pub(crate) fn record_inspection(&mut self, approved: bool, notes: Option<String>, now: DateTime<Utc>) {
    self.inspection_status = if approved {
      InspectionStatus::Approved
    } else {
      InspectionStatus::Rejected
    };
    self.inspection_notes = notes;
    self.touch(now);
  }

  pub(crate) fn assign_shopper(&mut self, shopper_id: Uuid, now: DateTime<Utc>) {
    self.shopper_id = Some(shopper_id);
    self.touch(now);
  }

  #[cfg(test)]
  pub(crate) fn unassign_shopper(&mut self) {
    self.shopper_id = None;
  }

  fn touch(&mut self, now: DateTime<Utc>) {
    // Keep updated_at monotonic even if the clock steps back.
    if now > self.updated_at {
      self.updated_at = now;
    }
  }
}

fn display_number(id: Uuid, now: DateTime<Utc>) -> String {
  let simple = id.simple().to_string().to_uppercase();
  format!("ORD-{}-{}", now.format("%Y%m%d"), &simple[..6])
}
