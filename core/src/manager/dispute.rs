// orderflow/src/manager/dispute.rs

//! The `open_dispute` workflow: load -> force_status -> file -> publish.

use super::incomplete;
use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, Operation};
use crate::model::{Actor, Dispute, Order, OrderStatus, Role};
use crate::notify::{Notifier, OrderTransitioned};
use crate::policy::{force_disputed, TransitionKind};
use crate::store::{OrderStore, StoreError};
use crate::workflow::{ContextData, StepControl, Workflow};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{event, Level};
use uuid::Uuid;

pub const WORKFLOW: &str = "open_dispute";
pub const LOAD: &str = "load";
pub const FORCE_STATUS: &str = "force_status";
pub const FILE: &str = "file";
pub const PUBLISH: &str = "publish";

#[derive(Debug, Clone)]
pub struct DisputeCtx {
  pub order_id: Uuid,
  pub actor: Actor,
  pub category: String,
  pub description: String,
  pub now: DateTime<Utc>,
  /// The role the reporter acts in: the party they are on the order, or admin.
  pub role: Option<Role>,
  pub order: Option<Order>,
  /// Set when this run moved the order into `disputed`.
  pub left_status: Option<OrderStatus>,
  pub dispute: Option<Dispute>,
}

impl DisputeCtx {
  pub fn new(
    order_id: Uuid,
    actor: Actor,
    category: impl Into<String>,
    description: impl Into<String>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      order_id,
      actor,
      category: category.into(),
      description: description.into(),
      now,
      role: None,
      order: None,
      left_status: None,
      dispute: None,
    }
  }
}

/// The role in which `actor` is a party to `order`, if any.
fn party_role(order: &Order, actor: &Actor) -> Option<Role> {
  if actor.has_role(Role::Consumer) && order.consumer_id == actor.user_id {
    Some(Role::Consumer)
  } else if actor.has_role(Role::Vendor) && order.vendor_id == actor.user_id {
    Some(Role::Vendor)
  } else if actor.has_role(Role::Shopper) && order.shopper_id() == Some(actor.user_id) {
    Some(Role::Shopper)
  } else if actor.is_admin() {
    Some(Role::Admin)
  } else {
    None
  }
}

/// Undoes `force_status` when the run ended without a dispute record behind
/// it. An order that meanwhile picked up another active dispute stays put.
pub(crate) async fn revert_unfiled(store: &dyn OrderStore, ctx: &DisputeCtx) {
  if ctx.dispute.is_some() {
    return;
  }
  let (Some(left), Some(order)) = (ctx.left_status, ctx.order.as_ref()) else {
    return;
  };
  let order_id = order.id();
  let reverted = async {
    let disputes = store.list_disputes(order_id).await?;
    if disputes.iter().any(|d| d.status.is_active()) {
      return Ok(false);
    }
    let mut restored = order.clone();
    restored.apply_transition(left, Utc::now());
    store.save_order(&restored, OrderStatus::Disputed).await?;
    Ok::<_, StoreError>(true)
  }
  .await;

  match reverted {
    Ok(true) => event!(Level::INFO, %order_id, status = %left, "No dispute was filed, order status restored."),
    Ok(false) => event!(Level::DEBUG, %order_id, "Order stays disputed under another open dispute."),
    Err(e) => event!(
      Level::WARN,
      %order_id,
      error = %e,
      "No dispute was filed and the order could not leave disputed."
    ),
  }
}

pub(crate) fn build(
  store: Arc<dyn OrderStore>,
  notifier: Arc<dyn Notifier>,
  config: &LifecycleConfig,
) -> Workflow<DisputeCtx, LifecycleError> {
  let mut flow = Workflow::new(
    WORKFLOW,
    &[(LOAD, false), (FORCE_STATUS, false), (FILE, false), (PUBLISH, false)],
  );

  let load_store = store.clone();
  flow.on(LOAD, move |ctx: ContextData<DisputeCtx>| {
    let store = load_store.clone();
    async move {
      let (order_id, actor, category, description) =
        ctx.with(|c| (c.order_id, c.actor.clone(), c.category.clone(), c.description.clone()));
      let order = store
        .load_order(order_id)
        .await
        .map_err(|e| LifecycleError::from_store("order", order_id, e))?;
      let role = party_role(&order, &actor).ok_or(LifecycleError::OperationNotPermitted {
        actor_id: actor.user_id,
        operation: Operation::OpenDispute,
      })?;
      if category.trim().is_empty() {
        return Err(LifecycleError::InvalidDispute("a category is required".to_string()));
      }
      if description.trim().is_empty() {
        return Err(LifecycleError::InvalidDispute("a description is required".to_string()));
      }
      ctx.with_mut(|c| {
        c.role = Some(role);
        c.order = Some(order);
      });
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let force_store = store.clone();
  let retry_limit = config.stale_retry_limit;
  flow.on(FORCE_STATUS, move |ctx: ContextData<DisputeCtx>| {
    let store = force_store.clone();
    async move {
      let (order_id, now, order) = ctx.with(|c| (c.order_id, c.now, c.order.clone()));
      let mut order = order.ok_or_else(|| incomplete(WORKFLOW, FORCE_STATUS, "order was not loaded"))?;
      let mut retries = 0;

      loop {
        let expected = order.status();
        let mut working = order.clone();
        let Some(left) = force_disputed(&mut working, now) else {
          // Terminal or already disputed: the dispute is filed, the status stays.
          event!(Level::DEBUG, %order_id, status = %expected, "Dispute filed without a status change.");
          ctx.with_mut(|c| c.order = Some(order));
          break;
        };
        match store.save_order(&working, expected).await {
          Ok(saved) => {
            ctx.with_mut(|c| {
              c.order = Some(saved);
              c.left_status = Some(left);
            });
            break;
          }
          Err(StoreError::Conflict { actual, .. }) if retries < retry_limit => {
            retries += 1;
            event!(Level::DEBUG, %order_id, %actual, retries, "Order moved while opening a dispute, retrying.");
            order = store
              .load_order(order_id)
              .await
              .map_err(|e| LifecycleError::from_store("order", order_id, e))?;
          }
          Err(e) => return Err(LifecycleError::from_store("order", order_id, e)),
        }
      }
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let file_store = store;
  flow.on(FILE, move |ctx: ContextData<DisputeCtx>| {
    let store = file_store.clone();
    async move {
      let dispute = ctx.with(|c| Dispute::open(c.order_id, c.actor.user_id, c.category.trim(), c.description.trim(), c.now));
      let filed = store.create_dispute(&dispute).await?;
      event!(Level::INFO, order_id = %filed.order_id, dispute_id = %filed.id, category = %filed.category, "Dispute opened.");
      ctx.with_mut(|c| c.dispute = Some(filed));
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  flow.on(PUBLISH, move |ctx: ContextData<DisputeCtx>| {
    let notifier = notifier.clone();
    async move {
      let (left, role, order_id, actor_id, now) = ctx.with(|c| (c.left_status, c.role, c.order_id, c.actor.user_id, c.now));
      if let (Some(from), Some(role)) = (left, role) {
        notifier.publish(OrderTransitioned {
          order_id,
          from,
          to: OrderStatus::Disputed,
          actor_id,
          role,
          kind: TransitionKind::Dispute,
          at: now,
        });
      }
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  flow
}
