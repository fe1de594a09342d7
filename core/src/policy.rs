// orderflow/src/policy.rs

//! Who may move an order from which status to which, and with what evidence.
//!
//! ```text
//! vendor   : pending -> accepted | cancelled, accepted -> preparing, preparing -> ready
//! shopper  : ready -> picked_up, picked_up -> inspecting (evidence required)
//! consumer : inspecting -> completed (payment gate must be open)
//! admin    : any non-terminal -> cancelled
//!            any non-terminal -> completed   (audited override, reason required)
//!            terminal -> other terminal      (audited override, reason required)
//! ```
//!
//! `disputed` is not reachable here; opening a dispute sets it directly.

use crate::error::{LifecycleError, Precondition, RoleList};
use crate::model::{Actor, Order, OrderStatus, Role, ShopperJob};
use crate::payment::{evidence_present, PaymentGate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use OrderStatus::*;

const TABLE: &[(Role, OrderStatus, OrderStatus)] = &[
  (Role::Vendor, Pending, Accepted),
  (Role::Vendor, Pending, Cancelled),
  (Role::Vendor, Accepted, Preparing),
  (Role::Vendor, Preparing, Ready),
  (Role::Shopper, Ready, PickedUp),
  (Role::Shopper, PickedUp, Inspecting),
  (Role::Consumer, Inspecting, Completed),
];

/// A caller's request to move an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
  pub to: OrderStatus,
  /// The status the caller last observed. Checked against the stored row.
  pub expected_status: OrderStatus,
  #[serde(default)]
  pub override_reason: Option<String>,
}

impl TransitionRequest {
  pub fn new(expected_status: OrderStatus, to: OrderStatus) -> Self {
    Self {
      to,
      expected_status,
      override_reason: None,
    }
  }

  pub fn with_override(mut self, reason: impl Into<String>) -> Self {
    self.override_reason = Some(reason.into());
    self
  }

  fn reason_supplied(&self) -> bool {
    self.override_reason.as_deref().is_some_and(|r| !r.trim().is_empty())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
  /// A move from the transition table.
  Normal,
  /// An admin move that bypasses the payment gate or the terminal lock.
  Override,
  /// The dispute escape hatch.
  Dispute,
}

/// What the policy granted: the role the move was made under and its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Approval {
  pub from: OrderStatus,
  pub to: OrderStatus,
  pub role: Role,
  pub kind: TransitionKind,
}

/// A move the actor could request right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableAction {
  pub to: OrderStatus,
  pub role: Role,
  pub kind: TransitionKind,
  pub requires_reason: bool,
}

/// True when some role's table entry (or the admin rules) allows `from -> to`.
fn role_allows(role: Role, from: OrderStatus, to: OrderStatus) -> bool {
  match role {
    Role::Admin => !from.is_terminal() && matches!(to, Cancelled | Completed),
    _ => TABLE.iter().any(|&(r, f, t)| r == role && f == from && t == to),
  }
}

fn reachable_by_anyone(from: OrderStatus, to: OrderStatus) -> bool {
  Role::ALL.into_iter().any(|role| role_allows(role, from, to))
}

/// Moving against the forward path `pending < ... < completed`.
pub fn is_backward(from: OrderStatus, to: OrderStatus) -> bool {
  match (from.forward_rank(), to.forward_rank()) {
    (Some(f), Some(t)) => t < f,
    _ => false,
  }
}

/// The dispute escape hatch. Moves any non-terminal order to `disputed`
/// without consulting the table and returns the status it left. Terminal and
/// already disputed orders stay where they are.
pub(crate) fn force_disputed(order: &mut Order, now: DateTime<Utc>) -> Option<OrderStatus> {
  let from = order.status();
  if from.is_terminal() || from == Disputed {
    return None;
  }
  order.apply_transition(Disputed, now);
  Some(from)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionPolicy;

impl TransitionPolicy {
  pub fn new() -> Self {
    Self
  }

  /// Decides whether `actor` may move `order` to `to`. Pure: never mutates.
  ///
  /// Checks run in this order: terminal lock, table membership, then
  /// ownership and evidence preconditions. When the actor holds several
  /// roles that could make the move, the first one whose preconditions pass
  /// wins (consumer, vendor, shopper, admin); if none pass, the first
  /// failure is reported.
  pub fn evaluate(
    &self,
    order: &Order,
    job: Option<&ShopperJob>,
    actor: &Actor,
    to: OrderStatus,
    override_reason: Option<&str>,
  ) -> Result<Approval, LifecycleError> {
    let reason_supplied = override_reason.is_some_and(|r| !r.trim().is_empty());
    self.evaluate_inner(order, job, actor, to, reason_supplied)
  }

  fn evaluate_inner(
    &self,
    order: &Order,
    job: Option<&ShopperJob>,
    actor: &Actor,
    to: OrderStatus,
    reason_supplied: bool,
  ) -> Result<Approval, LifecycleError> {
    let from = order.status();

    if from.is_terminal() {
      if actor.is_admin() && reason_supplied && to.is_terminal() && to != from {
        return Ok(Approval {
          from,
          to,
          role: Role::Admin,
          kind: TransitionKind::Override,
        });
      }
      return Err(LifecycleError::TerminalState { status: from });
    }

    if from == to || to == Disputed {
      return Err(LifecycleError::InvalidFromState { from, to });
    }

    let candidates: Vec<Role> = actor
      .roles
      .iter()
      .copied()
      .filter(|&role| role_allows(role, from, to))
      .collect();

    if candidates.is_empty() {
      if reachable_by_anyone(from, to) {
        return Err(LifecycleError::InvalidActorForTransition {
          actor_id: actor.user_id,
          roles: RoleList(actor.roles.iter().copied().collect()),
          from,
          to,
        });
      }
      return Err(LifecycleError::InvalidFromState { from, to });
    }

    let mut first_failure = None;
    for role in candidates {
      match self.check_preconditions(order, job, actor, role, to, reason_supplied) {
        Ok(kind) => return Ok(Approval { from, to, role, kind }),
        Err(e) => {
          first_failure.get_or_insert(e);
        }
      }
    }
    // candidates was non-empty, so at least one failure was recorded.
    Err(first_failure.unwrap_or(LifecycleError::InvalidFromState { from, to }))
  }

  fn check_preconditions(
    &self,
    order: &Order,
    job: Option<&ShopperJob>,
    actor: &Actor,
    role: Role,
    to: OrderStatus,
    reason_supplied: bool,
  ) -> Result<TransitionKind, LifecycleError> {
    let not_yours = || LifecycleError::InvalidActorForTransition {
      actor_id: actor.user_id,
      roles: RoleList(vec![role]),
      from: order.status(),
      to,
    };

    match role {
      Role::Vendor => {
        if order.vendor_id != actor.user_id {
          return Err(not_yours());
        }
      }
      Role::Shopper => {
        match order.shopper_id() {
          None => return Err(LifecycleError::PreconditionNotMet(Precondition::NoShopperAssigned)),
          Some(assigned) if assigned != actor.user_id => return Err(not_yours()),
          Some(_) => {}
        }
        if to == Inspecting && !evidence_present(order, job) {
          return Err(LifecycleError::PreconditionNotMet(Precondition::EvidenceMissing));
        }
      }
      Role::Consumer => {
        if order.consumer_id != actor.user_id {
          return Err(not_yours());
        }
        if to == Completed {
          let blockers = PaymentGate::blockers(order, job);
          if !blockers.is_empty() {
            return Err(LifecycleError::PreconditionNotMet(Precondition::PaymentNotAuthorized(
              blockers.iter().map(ToString::to_string).collect(),
            )));
          }
        }
      }
      Role::Admin => {
        if to == Completed {
          if !reason_supplied {
            return Err(LifecycleError::PreconditionNotMet(Precondition::OverrideReasonRequired));
          }
          return Ok(TransitionKind::Override);
        }
      }
    }
    Ok(TransitionKind::Normal)
  }

  /// Validates `request` against `order` and applies it in place.
  ///
  /// `order` is untouched on any error. A request whose `expected_status`
  /// differs from the order's current status fails with `StaleState` before
  /// any rule is consulted.
  pub fn attempt(
    &self,
    order: &mut Order,
    job: Option<&ShopperJob>,
    actor: &Actor,
    request: &TransitionRequest,
    now: DateTime<Utc>,
  ) -> Result<Approval, LifecycleError> {
    if order.status() != request.expected_status {
      return Err(LifecycleError::StaleState {
        expected: request.expected_status,
        actual: order.status(),
      });
    }
    let approval = self.evaluate_inner(order, job, actor, request.to, request.reason_supplied())?;
    order.apply_transition(approval.to, now);
    Ok(approval)
  }

  /// Every move the actor could request now, for UIs to render as buttons.
  /// Moves that need an override reason are listed with `requires_reason`.
  pub fn available_actions(&self, order: &Order, job: Option<&ShopperJob>, actor: &Actor) -> Vec<AvailableAction> {
    OrderStatus::ALL
      .into_iter()
      .filter_map(|to| {
        let approval = self.evaluate_inner(order, job, actor, to, true).ok()?;
        let requires_reason = self.evaluate_inner(order, job, actor, to, false).is_err();
        Some(AvailableAction {
          to,
          role: approval.role,
          kind: approval.kind,
          requires_reason,
        })
      })
      .collect()
  }
}
