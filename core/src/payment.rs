// orderflow/src/payment.rs

//! The payment gate: whether "Pay Now" may be offered for an order.
//!
//! Derived from the order (and its shopper job) on every call; nothing is
//! cached, because inspection can flip between rejected and approved without
//! the order status moving.

use crate::model::{InspectionStatus, Order, OrderStatus, ShopperJob};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentBlocker {
  EvidenceMissing,
  InspectionPending,
  InspectionRejected,
  AlreadyCompleted,
}

impl fmt::Display for PaymentBlocker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      PaymentBlocker::EvidenceMissing => "no proof of purchase or item confirmation has been provided",
      PaymentBlocker::InspectionPending => "the items have not been inspected yet",
      PaymentBlocker::InspectionRejected => "the inspection was rejected",
      PaymentBlocker::AlreadyCompleted => "the order is already completed",
    })
  }
}

/// Proof of purchase on the order, the vendor's confirmation, or a proof the
/// shopper uploaded to the order's job.
pub fn evidence_present(order: &Order, job: Option<&ShopperJob>) -> bool {
  order.has_own_evidence() || job.is_some_and(|j| j.order_id == order.id() && j.proof_url.is_some())
}

pub struct PaymentGate;

impl PaymentGate {
  pub fn can_pay(order: &Order, job: Option<&ShopperJob>) -> bool {
    Self::blockers(order, job).is_empty()
  }

  /// Every reason payment is unavailable, in a stable order.
  pub fn blockers(order: &Order, job: Option<&ShopperJob>) -> Vec<PaymentBlocker> {
    let mut blockers = Vec::new();
    if !evidence_present(order, job) {
      blockers.push(PaymentBlocker::EvidenceMissing);
    }
    match order.inspection_status() {
      InspectionStatus::Approved => {}
      InspectionStatus::Pending => blockers.push(PaymentBlocker::InspectionPending),
      InspectionStatus::Rejected => blockers.push(PaymentBlocker::InspectionRejected),
    }
    if order.status() == OrderStatus::Completed {
      blockers.push(PaymentBlocker::AlreadyCompleted);
    }
    blockers
  }
}
