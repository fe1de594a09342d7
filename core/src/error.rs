// orderflow/src/error.rs

use crate::model::{DisputeStatus, OrderStatus, Role};
use crate::store::StoreError;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the step engine itself, independent of any order.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("workflow '{workflow}': required step '{step_name}' has no handlers")]
  HandlerMissing { workflow: String, step_name: String },

  #[error("workflow '{workflow}': step '{step_name}' left the context incomplete: {message}")]
  IncompleteContext {
    workflow: String,
    step_name: String,
    message: String,
  },

  #[error("workflow '{workflow}' was halted before anything was committed")]
  HaltedBeforeCommit { workflow: String },
}

/// Which evidence or state was missing when a valid transition was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
  /// Neither a proof-of-purchase reference nor vendor confirmation.
  EvidenceMissing,
  /// The payment gate is closed; the strings are the gate's reasons.
  PaymentNotAuthorized(Vec<String>),
  /// Shopper work on an order nobody has claimed yet.
  NoShopperAssigned,
  /// Admin completion without an audit reason.
  OverrideReasonRequired,
  /// Inspection recorded outside the `inspecting` status.
  InspectionNotOpen(OrderStatus),
  /// The shopper job has already been claimed.
  JobAlreadyClaimed,
}

impl fmt::Display for Precondition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Precondition::EvidenceMissing => {
        f.write_str("a proof-of-purchase image or the vendor's item confirmation is required")
      }
      Precondition::PaymentNotAuthorized(reasons) => write!(f, "payment is not available yet: {}", reasons.join("; ")),
      Precondition::NoShopperAssigned => f.write_str("no shopper has claimed this order yet"),
      Precondition::OverrideReasonRequired => f.write_str("an admin completion must carry an audit reason"),
      Precondition::InspectionNotOpen(status) => write!(f, "the order is {} and cannot be inspected now", status),
      Precondition::JobAlreadyClaimed => f.write_str("another shopper already claimed this job"),
    }
  }
}

/// Side operations that are not status transitions but are still gated by
/// role and ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  PlaceOrder,
  AttachProof,
  ConfirmItems,
  RecordInspection,
  ClaimJob,
  OpenDispute,
  ManageDispute,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Operation::PlaceOrder => "place an order",
      Operation::AttachProof => "attach proof of purchase",
      Operation::ConfirmItems => "confirm the items",
      Operation::RecordInspection => "record the inspection",
      Operation::ClaimJob => "claim this job",
      Operation::OpenDispute => "open a dispute",
      Operation::ManageDispute => "manage disputes",
    })
  }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
  #[error("actor {actor_id} ({roles}) may not move an order from {from} to {to}")]
  InvalidActorForTransition {
    actor_id: Uuid,
    roles: RoleList,
    from: OrderStatus,
    to: OrderStatus,
  },

  #[error("no transition exists from {from} to {to}")]
  InvalidFromState { from: OrderStatus, to: OrderStatus },

  #[error("precondition not met: {0}")]
  PreconditionNotMet(Precondition),

  #[error("order is {status}; only an audited admin override may change it")]
  TerminalState { status: OrderStatus },

  #[error("stale order state: expected {expected}, found {actual}")]
  StaleState { expected: OrderStatus, actual: OrderStatus },

  #[error("actor {actor_id} may not {operation}")]
  OperationNotPermitted { actor_id: Uuid, operation: Operation },

  #[error("dispute cannot move from {from} to {to}")]
  InvalidDisputeTransition { from: DisputeStatus, to: DisputeStatus },

  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: Uuid },

  #[error("invalid order: {0}")]
  InvalidOrder(String),

  #[error("invalid dispute: {0}")]
  InvalidDispute(String),

  #[error("persistence unavailable: {0}")]
  PersistenceUnavailable(#[source] StoreError),

  #[error(transparent)]
  Engine(#[from] EngineError),
}

impl LifecycleError {
  /// One sentence a UI can show as-is.
  pub fn user_message(&self) -> String {
    match self {
      LifecycleError::InvalidActorForTransition { to, .. } => {
        format!("You are not allowed to mark this order as {}.", to)
      }
      LifecycleError::InvalidFromState { from, to } => {
        format!("An order that is {} cannot be marked as {}.", from, to)
      }
      LifecycleError::PreconditionNotMet(p) => format!("This step is blocked: {}.", p),
      LifecycleError::TerminalState { status } => format!("This order is already {} and can no longer change.", status),
      LifecycleError::StaleState { .. } => "Someone already updated this order, refresh and try again.".to_string(),
      LifecycleError::OperationNotPermitted { operation, .. } => format!("You are not allowed to {}.", operation),
      LifecycleError::InvalidDisputeTransition { from, to } => {
        format!("A dispute that is {} cannot be marked as {}.", from, to)
      }
      LifecycleError::NotFound { entity, .. } => format!("That {} does not exist.", entity),
      LifecycleError::InvalidOrder(m) => format!("The order is invalid: {}.", m),
      LifecycleError::InvalidDispute(m) => format!("The dispute is invalid: {}.", m),
      LifecycleError::PersistenceUnavailable(_) => "The order service is unavailable, please retry shortly.".to_string(),
      LifecycleError::Engine(_) => "The order service is misconfigured.".to_string(),
    }
  }

  /// Worth retrying after a reload (stale) or a backoff (store down).
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      LifecycleError::StaleState { .. } | LifecycleError::PersistenceUnavailable(_)
    )
  }

  pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
    LifecycleError::NotFound { entity, id }
  }

  /// Lifts a store failure, naming the entity for `NotFound`.
  pub(crate) fn from_store(entity: &'static str, id: Uuid, err: StoreError) -> Self {
    match err {
      StoreError::NotFound => LifecycleError::not_found(entity, id),
      other => LifecycleError::from(other),
    }
  }
}

impl From<StoreError> for LifecycleError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::Conflict { expected, actual } => LifecycleError::StaleState { expected, actual },
      StoreError::JobConflict { .. } => LifecycleError::PreconditionNotMet(Precondition::JobAlreadyClaimed),
      other => LifecycleError::PersistenceUnavailable(other),
    }
  }
}

/// Display helper so the role set prints as `consumer,admin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleList(pub Vec<Role>);

impl fmt::Display for RoleList {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() {
      return f.write_str("no roles");
    }
    let names: Vec<&str> = self.0.iter().map(Role::as_str).collect();
    f.write_str(&names.join(","))
  }
}

pub type LifecycleResult<T, E = LifecycleError> = std::result::Result<T, E>;
