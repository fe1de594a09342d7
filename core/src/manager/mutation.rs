// orderflow/src/manager/mutation.rs

//! The `order_mutation` workflow: load -> authorize -> commit -> sync_job -> publish.
//!
//! Transitions, evidence, inspection and job claims all go through it; they
//! differ only in what `authorize` does to the working copy.

use super::incomplete;
use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, Operation, Precondition};
use crate::model::{Actor, Order, OrderStatus, Role, ShopperJob, ShopperJobStatus};
use crate::notify::{Notifier, OrderTransitioned};
use crate::policy::{Approval, TransitionKind, TransitionPolicy, TransitionRequest};
use crate::store::{OrderStore, StoreError};
use crate::workflow::{ContextData, StepControl, Workflow};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{event, Level};
use uuid::Uuid;

pub const WORKFLOW: &str = "order_mutation";
pub const LOAD: &str = "load";
pub const AUTHORIZE: &str = "authorize";
pub const COMMIT: &str = "commit";
pub const SYNC_JOB: &str = "sync_job";
pub const PUBLISH: &str = "publish";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderMutation {
  Transition(TransitionRequest),
  AttachProof { reference: String },
  ConfirmItems,
  RecordInspection { approved: bool, notes: Option<String> },
  ClaimJob,
}

/// Working state of one `order_mutation` run. Hooks registered by the
/// embedding application see the same struct.
#[derive(Debug, Clone)]
pub struct MutationCtx {
  pub order_id: Uuid,
  pub actor: Actor,
  pub mutation: OrderMutation,
  pub now: DateTime<Utc>,
  /// The row as read in `load`.
  pub loaded: Option<Order>,
  pub job: Option<ShopperJob>,
  /// Working copy produced by `authorize`.
  pub pending: Option<Order>,
  /// Job write to perform after the order commit, with its CAS token.
  pub job_update: Option<(ShopperJob, ShopperJobStatus)>,
  pub approval: Option<Approval>,
  /// Job held by the claiming shopper after `authorize`. Released again when
  /// the run ends without a committed order.
  pub claimed: Option<ShopperJob>,
  /// The row as written in `commit`.
  pub committed: Option<Order>,
}

impl MutationCtx {
  pub fn new(order_id: Uuid, actor: Actor, mutation: OrderMutation, now: DateTime<Utc>) -> Self {
    Self {
      order_id,
      actor,
      mutation,
      now,
      loaded: None,
      job: None,
      pending: None,
      job_update: None,
      approval: None,
      claimed: None,
      committed: None,
    }
  }

  fn expected_status(&self) -> Option<OrderStatus> {
    match &self.mutation {
      OrderMutation::Transition(request) => Some(request.expected_status),
      _ => self.loaded.as_ref().map(Order::status),
    }
  }
}

fn not_permitted(actor: &Actor, operation: Operation) -> LifecycleError {
  LifecycleError::OperationNotPermitted {
    actor_id: actor.user_id,
    operation,
  }
}

fn guard_open(order: &Order) -> Result<(), LifecycleError> {
  if order.status().is_terminal() {
    return Err(LifecycleError::TerminalState { status: order.status() });
  }
  Ok(())
}

/// Applies a non-transition mutation to `pending` after checking who asks.
/// Returns the job write to perform once the order is committed.
fn apply_side_mutation(
  mutation: &OrderMutation,
  actor: &Actor,
  loaded: &Order,
  job: Option<&ShopperJob>,
  pending: &mut Order,
  now: DateTime<Utc>,
) -> Result<Option<(ShopperJob, ShopperJobStatus)>, LifecycleError> {
  guard_open(loaded)?;
  match mutation {
    OrderMutation::AttachProof { reference } => {
      let assigned_shopper = actor.has_role(Role::Shopper) && loaded.shopper_id() == Some(actor.user_id);
      let owning_vendor = actor.has_role(Role::Vendor) && loaded.vendor_id == actor.user_id;
      if !(assigned_shopper || owning_vendor) {
        return Err(not_permitted(actor, Operation::AttachProof));
      }
      if reference.trim().is_empty() {
        return Err(LifecycleError::InvalidOrder("the proof reference is empty".to_string()));
      }
      pending.attach_proof(reference.clone(), now);
      Ok(job.cloned().map(|mut j| {
        let prior = j.status;
        j.proof_url = Some(reference.clone());
        (j, prior)
      }))
    }
    OrderMutation::ConfirmItems => {
      if !(actor.has_role(Role::Vendor) && loaded.vendor_id == actor.user_id) {
        return Err(not_permitted(actor, Operation::ConfirmItems));
      }
      pending.confirm_all_items(now);
      Ok(None)
    }
    OrderMutation::RecordInspection { approved, notes } => {
      if !(actor.has_role(Role::Consumer) && loaded.consumer_id == actor.user_id) {
        return Err(not_permitted(actor, Operation::RecordInspection));
      }
      if loaded.status() != OrderStatus::Inspecting {
        return Err(LifecycleError::PreconditionNotMet(Precondition::InspectionNotOpen(
          loaded.status(),
        )));
      }
      pending.record_inspection(*approved, notes.clone(), now);
      Ok(None)
    }
    // Transitions and claims are handled by the authorize step itself.
    OrderMutation::Transition(_) | OrderMutation::ClaimJob => Ok(None),
  }
}

/// Puts the job of a claim whose order write never landed back up for grabs.
/// If that write fails too, the job stays with the shopper, who finishes the
/// claim by claiming again.
pub(crate) async fn release_unfinished_claim(store: &dyn OrderStore, ctx: &MutationCtx) {
  if ctx.committed.is_some() {
    return;
  }
  let Some(claimed) = ctx.claimed.as_ref() else {
    return;
  };
  let mut released = claimed.clone();
  released.release();
  match store.save_shopper_job(&released, ShopperJobStatus::Accepted).await {
    Ok(_) => {
      event!(Level::INFO, order_id = %claimed.order_id, "Released a shopper claim that did not reach the order.");
    }
    Err(e) => {
      event!(
        Level::WARN,
        order_id = %claimed.order_id,
        shopper_id = ?claimed.shopper_id,
        error = %e,
        "Shopper claim did not reach the order and could not be released."
      );
    }
  }
}

pub(crate) fn build(
  store: Arc<dyn OrderStore>,
  notifier: Arc<dyn Notifier>,
  policy: TransitionPolicy,
  config: &LifecycleConfig,
) -> Workflow<MutationCtx, LifecycleError> {
  let mut flow = Workflow::new(
    WORKFLOW,
    &[
      (LOAD, false),
      (AUTHORIZE, false),
      (COMMIT, false),
      (SYNC_JOB, true),
      (PUBLISH, false),
    ],
  );

  let load_store = store.clone();
  flow.on(LOAD, move |ctx: ContextData<MutationCtx>| {
    let store = load_store.clone();
    async move {
      let order_id = ctx.read().order_id;
      let order = store
        .load_order(order_id)
        .await
        .map_err(|e| LifecycleError::from_store("order", order_id, e))?;
      let job = store.load_shopper_job(order_id).await?;
      ctx.with_mut(|c| {
        c.loaded = Some(order);
        c.job = job;
      });
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let claim_store = store.clone();
  flow.on(AUTHORIZE, move |ctx: ContextData<MutationCtx>| {
    let store = claim_store.clone();
    async move {
      let (actor, mutation, now, loaded, job) =
        ctx.with(|c| (c.actor.clone(), c.mutation.clone(), c.now, c.loaded.clone(), c.job.clone()));
      let loaded = loaded.ok_or_else(|| incomplete(WORKFLOW, AUTHORIZE, "order was not loaded"))?;
      let mut pending = loaded.clone();

      match &mutation {
        OrderMutation::Transition(request) => {
          let approval = policy.attempt(&mut pending, job.as_ref(), &actor, request, now)?;
          let job_update = job.clone().and_then(|mut j| {
            let prior = j.status;
            j.follow_order(approval.to, now).then_some((j, prior))
          });
          ctx.with_mut(|c| {
            c.approval = Some(approval);
            c.job_update = job_update;
          });
        }
        OrderMutation::ClaimJob => {
          guard_open(&loaded)?;
          if !actor.has_role(Role::Shopper) {
            return Err(not_permitted(&actor, Operation::ClaimJob));
          }
          let mut claim = job.ok_or_else(|| LifecycleError::not_found("shopper job", loaded.id()))?;
          if loaded.shopper_id().is_some() {
            return Err(LifecycleError::PreconditionNotMet(Precondition::JobAlreadyClaimed));
          }
          let claimed = if claim.is_held_by(actor.user_id) {
            // An earlier claim by this shopper won the job but never reached the order.
            event!(Level::INFO, order_id = %loaded.id(), shopper_id = %actor.user_id, "Finishing an earlier shopper claim.");
            claim
          } else if claim.is_claimable() {
            claim.accept(actor.user_id, now);
            // The job row is the contended resource; whoever swaps it first owns the order.
            let claimed = store.save_shopper_job(&claim, ShopperJobStatus::Available).await?;
            event!(Level::INFO, order_id = %loaded.id(), shopper_id = %actor.user_id, "Shopper job claimed.");
            claimed
          } else {
            return Err(LifecycleError::PreconditionNotMet(Precondition::JobAlreadyClaimed));
          };
          ctx.with_mut(|c| {
            c.job = Some(claimed.clone());
            c.claimed = Some(claimed);
          });
          pending.assign_shopper(actor.user_id, now);
        }
        side => {
          let job_update = apply_side_mutation(side, &actor, &loaded, job.as_ref(), &mut pending, now)?;
          ctx.with_mut(|c| c.job_update = job_update);
        }
      }

      ctx.with_mut(|c| c.pending = Some(pending));
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let commit_store = store.clone();
  let retry_limit = config.stale_retry_limit;
  flow.on(COMMIT, move |ctx: ContextData<MutationCtx>| {
    let store = commit_store.clone();
    async move {
      let (pending, expected, is_claim, order_id, actor_id, now) = ctx.with(|c| {
        (
          c.pending.clone(),
          c.expected_status(),
          matches!(c.mutation, OrderMutation::ClaimJob),
          c.order_id,
          c.actor.user_id,
          c.now,
        )
      });
      let mut attempt = pending.ok_or_else(|| incomplete(WORKFLOW, COMMIT, "nothing to commit"))?;
      let mut expected = expected.ok_or_else(|| incomplete(WORKFLOW, COMMIT, "no concurrency token"))?;
      let mut retries = 0;

      let committed = loop {
        match store.save_order(&attempt, expected).await {
          Ok(saved) => break saved,
          // A claimed job must end up on its order; re-read and re-assign.
          Err(StoreError::Conflict { actual, .. }) if is_claim && retries < retry_limit => {
            retries += 1;
            event!(Level::DEBUG, %order_id, %actual, retries, "Order moved while assigning shopper, retrying.");
            let mut fresh = store
              .load_order(order_id)
              .await
              .map_err(|e| LifecycleError::from_store("order", order_id, e))?;
            guard_open(&fresh)?;
            fresh.assign_shopper(actor_id, now);
            expected = fresh.status();
            attempt = fresh;
          }
          Err(e) => return Err(LifecycleError::from_store("order", order_id, e)),
        }
      };

      ctx.with_mut(|c| c.committed = Some(committed));
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let job_store = store;
  flow.on(SYNC_JOB, move |ctx: ContextData<MutationCtx>| {
    let store = job_store.clone();
    async move {
      let Some((job, prior)) = ctx.with(|c| c.job_update.clone()) else {
        return Ok::<_, LifecycleError>(StepControl::Continue);
      };
      // The order is already committed; the job is bookkeeping that follows it.
      match store.save_shopper_job(&job, prior).await {
        Ok(saved) => ctx.with_mut(|c| c.job = Some(saved)),
        Err(e) => {
          event!(Level::WARN, order_id = %job.order_id, error = %e, "Shopper job could not follow the order.");
        }
      }
      Ok(StepControl::Continue)
    }
  });

  flow.on(PUBLISH, move |ctx: ContextData<MutationCtx>| {
    let notifier = notifier.clone();
    async move {
      let (approval, actor_id, order_id, now, reason) = ctx.with(|c| {
        let reason = match &c.mutation {
          OrderMutation::Transition(request) => request.override_reason.clone(),
          _ => None,
        };
        (c.approval, c.actor.user_id, c.order_id, c.now, reason)
      });
      let Some(approval) = approval else {
        return Ok::<_, LifecycleError>(StepControl::Continue);
      };

      if approval.kind == TransitionKind::Override {
        event!(
          target: "orderflow::audit",
          Level::WARN,
          %order_id,
          %actor_id,
          from = %approval.from,
          to = %approval.to,
          reason = reason.as_deref().unwrap_or(""),
          "Admin override applied."
        );
      } else {
        event!(Level::INFO, %order_id, from = %approval.from, to = %approval.to, role = %approval.role, "Order transitioned.");
      }

      notifier.publish(OrderTransitioned {
        order_id,
        from: approval.from,
        to: approval.to,
        actor_id,
        role: approval.role,
        kind: approval.kind,
        at: now,
      });
      Ok(StepControl::Continue)
    }
  });

  flow
}
