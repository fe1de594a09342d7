// orderflow/src/manager/mod.rs

//! `OrderLifecycleManager`: the entry point the HTTP layer talks to.
//!
//! Order mutations run as workflows (see [`mutation`] and [`dispute`]) so an
//! embedding application can hook audit or side effects onto named steps.
//! Creation and dispute bookkeeping are plain methods.

pub mod dispute;
pub mod mutation;

use crate::config::LifecycleConfig;
use crate::error::{EngineError, LifecycleError, LifecycleResult, Operation, RoleList};
use crate::model::{Actor, Dispute, DisputeStatus, NewOrder, Order, OrderStatus, Role, ShopperJob};
use crate::notify::Notifier;
use crate::payment::{PaymentBlocker, PaymentGate};
use crate::policy::{Approval, AvailableAction, TransitionPolicy, TransitionRequest};
use crate::store::{OrderStore, StoreError};
use crate::workflow::{ContextData, Workflow};
use chrono::Utc;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

pub use dispute::DisputeCtx;
pub use mutation::{MutationCtx, OrderMutation};

pub(crate) fn incomplete(workflow: &str, step_name: &str, message: &str) -> LifecycleError {
  EngineError::IncompleteContext {
    workflow: workflow.to_string(),
    step_name: step_name.to_string(),
    message: message.to_string(),
  }
  .into()
}

/// What an order mutation left behind.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
  pub order: Order,
  pub job: Option<ShopperJob>,
  /// Present for status transitions only.
  pub approval: Option<Approval>,
}

pub struct OrderLifecycleManager {
  store: Arc<dyn OrderStore>,
  policy: TransitionPolicy,
  config: LifecycleConfig,
  mutation_flow: Workflow<MutationCtx, LifecycleError>,
  dispute_flow: Workflow<DisputeCtx, LifecycleError>,
}

impl OrderLifecycleManager {
  pub fn new(store: Arc<dyn OrderStore>, notifier: Arc<dyn Notifier>, config: LifecycleConfig) -> Self {
    let policy = TransitionPolicy::new();
    let mutation_flow = mutation::build(store.clone(), notifier.clone(), policy, &config);
    let dispute_flow = dispute::build(store.clone(), notifier, &config);
    Self {
      store,
      policy,
      config,
      mutation_flow,
      dispute_flow,
    }
  }

  pub fn config(&self) -> &LifecycleConfig {
    &self.config
  }

  /// For registering extra handlers on `order_mutation` steps.
  pub fn mutation_workflow_mut(&mut self) -> &mut Workflow<MutationCtx, LifecycleError> {
    &mut self.mutation_flow
  }

  /// For registering extra handlers on `open_dispute` steps.
  pub fn dispute_workflow_mut(&mut self) -> &mut Workflow<DisputeCtx, LifecycleError> {
    &mut self.dispute_flow
  }

  // --- Creation and queries ---

  /// Persists a new `pending` order and its unclaimed shopper job.
  #[instrument(name = "OrderLifecycleManager::create_order", skip_all, fields(consumer_id = %input.consumer_id))]
  pub async fn create_order(&self, input: NewOrder) -> LifecycleResult<(Order, ShopperJob)> {
    let order = Order::create(input, &self.config.fees, Utc::now())?;
    match self.store.insert_order(&order).await {
      Ok(()) => {}
      Err(StoreError::Duplicate) => {
        return Err(LifecycleError::InvalidOrder(format!(
          "order number {} is already taken",
          order.order_number()
        )))
      }
      Err(e) => return Err(e.into()),
    }
    let job = ShopperJob::for_order(&order);
    self.store.insert_shopper_job(&job).await?;
    event!(
      Level::INFO,
      order_id = %order.id(),
      order_number = order.order_number(),
      total_cents = order.total_cents(),
      "Order created."
    );
    Ok((order, job))
  }

  pub async fn get_order(&self, order_id: Uuid) -> LifecycleResult<Order> {
    self
      .store
      .load_order(order_id)
      .await
      .map_err(|e| LifecycleError::from_store("order", order_id, e))
  }

  pub async fn get_shopper_job(&self, order_id: Uuid) -> LifecycleResult<Option<ShopperJob>> {
    Ok(self.store.load_shopper_job(order_id).await?)
  }

  pub async fn list_available_jobs(&self) -> LifecycleResult<Vec<ShopperJob>> {
    Ok(self.store.list_available_jobs().await?)
  }

  pub async fn get_dispute(&self, dispute_id: Uuid) -> LifecycleResult<Dispute> {
    self
      .store
      .load_dispute(dispute_id)
      .await
      .map_err(|e| LifecycleError::from_store("dispute", dispute_id, e))
  }

  pub async fn list_disputes(&self, order_id: Uuid) -> LifecycleResult<Vec<Dispute>> {
    // Surfaces NotFound for unknown orders rather than an empty list.
    self.get_order(order_id).await?;
    Ok(self.store.list_disputes(order_id).await?)
  }

  async fn load_with_job(&self, order_id: Uuid) -> LifecycleResult<(Order, Option<ShopperJob>)> {
    let order = self.get_order(order_id).await?;
    let job = self.store.load_shopper_job(order_id).await?;
    Ok((order, job))
  }

  pub async fn available_actions(&self, order_id: Uuid, actor: &Actor) -> LifecycleResult<Vec<AvailableAction>> {
    let (order, job) = self.load_with_job(order_id).await?;
    Ok(self.policy.available_actions(&order, job.as_ref(), actor))
  }

  pub async fn can_pay(&self, order_id: Uuid) -> LifecycleResult<bool> {
    let (order, job) = self.load_with_job(order_id).await?;
    Ok(PaymentGate::can_pay(&order, job.as_ref()))
  }

  pub async fn payment_blockers(&self, order_id: Uuid) -> LifecycleResult<Vec<PaymentBlocker>> {
    let (order, job) = self.load_with_job(order_id).await?;
    Ok(PaymentGate::blockers(&order, job.as_ref()))
  }

  // --- Order mutations ---

  #[instrument(
    name = "OrderLifecycleManager::run_mutation",
    skip_all,
    fields(%order_id, actor_id = %actor.user_id)
  )]
  async fn run_mutation(
    &self,
    order_id: Uuid,
    actor: &Actor,
    mutation: OrderMutation,
  ) -> LifecycleResult<MutationOutcome> {
    let ctx = ContextData::new(MutationCtx::new(order_id, actor.clone(), mutation, Utc::now()));
    let run = self.mutation_flow.run(ctx.clone()).await;
    let finished = ctx.snapshot();
    mutation::release_unfinished_claim(self.store.as_ref(), &finished).await;
    run?;
    // A hook may halt the run; only a committed order counts as success.
    let order = finished.committed.ok_or_else(|| EngineError::HaltedBeforeCommit {
      workflow: self.mutation_flow.name().to_string(),
    })?;
    Ok(MutationOutcome {
      order,
      job: finished.job,
      approval: finished.approval,
    })
  }

  /// Moves the order to `request.to` if the policy allows it and nobody else
  /// moved it since the caller read `request.expected_status`.
  pub async fn transition(
    &self,
    order_id: Uuid,
    actor: &Actor,
    request: TransitionRequest,
  ) -> LifecycleResult<MutationOutcome> {
    self.run_mutation(order_id, actor, OrderMutation::Transition(request)).await
  }

  /// The consumer's "Pay Now": `inspecting -> completed`, taken in the
  /// consumer role even when the actor holds others.
  pub async fn pay(
    &self,
    order_id: Uuid,
    actor: &Actor,
    expected_status: OrderStatus,
  ) -> LifecycleResult<MutationOutcome> {
    if !actor.has_role(Role::Consumer) {
      return Err(LifecycleError::InvalidActorForTransition {
        actor_id: actor.user_id,
        roles: RoleList(actor.roles.iter().copied().collect()),
        from: expected_status,
        to: OrderStatus::Completed,
      });
    }
    let as_consumer = Actor::consumer(actor.user_id);
    let request = TransitionRequest::new(expected_status, OrderStatus::Completed);
    self.transition(order_id, &as_consumer, request).await
  }

  pub async fn attach_proof(
    &self,
    order_id: Uuid,
    actor: &Actor,
    reference: impl Into<String>,
  ) -> LifecycleResult<MutationOutcome> {
    let reference = reference.into();
    self
      .run_mutation(order_id, actor, OrderMutation::AttachProof { reference })
      .await
  }

  pub async fn confirm_all_items(&self, order_id: Uuid, actor: &Actor) -> LifecycleResult<MutationOutcome> {
    self.run_mutation(order_id, actor, OrderMutation::ConfirmItems).await
  }

  pub async fn record_inspection(
    &self,
    order_id: Uuid,
    actor: &Actor,
    approved: bool,
    notes: Option<String>,
  ) -> LifecycleResult<MutationOutcome> {
    self
      .run_mutation(order_id, actor, OrderMutation::RecordInspection { approved, notes })
      .await
  }

  /// First shopper to claim wins; later claims fail with `JobAlreadyClaimed`.
  pub async fn claim_job(&self, order_id: Uuid, actor: &Actor) -> LifecycleResult<ShopperJob> {
    let outcome = self.run_mutation(order_id, actor, OrderMutation::ClaimJob).await?;
    outcome
      .job
      .ok_or_else(|| incomplete(mutation::WORKFLOW, mutation::AUTHORIZE, "claimed job missing"))
  }

  // --- Disputes ---

  /// Files a dispute and, unless the order is terminal, moves it to
  /// `disputed` regardless of the transition table.
  #[instrument(name = "OrderLifecycleManager::open_dispute", skip_all, fields(%order_id, actor_id = %actor.user_id))]
  pub async fn open_dispute(
    &self,
    order_id: Uuid,
    actor: &Actor,
    category: impl Into<String>,
    description: impl Into<String>,
  ) -> LifecycleResult<(Dispute, Order)> {
    let ctx = ContextData::new(DisputeCtx::new(order_id, actor.clone(), category, description, Utc::now()));
    let run = self.dispute_flow.run(ctx.clone()).await;
    let finished = ctx.snapshot();
    dispute::revert_unfiled(self.store.as_ref(), &finished).await;
    run?;
    match (finished.dispute, finished.order) {
      (Some(dispute), Some(order)) => Ok((dispute, order)),
      _ => Err(
        EngineError::HaltedBeforeCommit {
          workflow: self.dispute_flow.name().to_string(),
        }
        .into(),
      ),
    }
  }

  /// Admin bookkeeping. Never touches the order status; a disputed order is
  /// moved on by an explicit admin transition.
  async fn change_dispute(
    &self,
    dispute_id: Uuid,
    actor: &Actor,
    to: DisputeStatus,
    apply: impl FnOnce(&mut Dispute),
  ) -> LifecycleResult<Dispute> {
    if !actor.is_admin() {
      return Err(LifecycleError::OperationNotPermitted {
        actor_id: actor.user_id,
        operation: Operation::ManageDispute,
      });
    }
    let mut dispute = self.get_dispute(dispute_id).await?;
    if !dispute.status.can_move_to(to) {
      return Err(LifecycleError::InvalidDisputeTransition {
        from: dispute.status,
        to,
      });
    }
    let from = dispute.status;
    dispute.status = to;
    apply(&mut dispute);
    dispute.updated_at = Utc::now().max(dispute.updated_at);
    let saved = self
      .store
      .save_dispute(&dispute)
      .await
      .map_err(|e| LifecycleError::from_store("dispute", dispute_id, e))?;
    event!(Level::INFO, %dispute_id, %from, %to, admin_id = %actor.user_id, "Dispute status changed.");
    Ok(saved)
  }

  pub async fn review_dispute(&self, dispute_id: Uuid, actor: &Actor) -> LifecycleResult<Dispute> {
    self
      .change_dispute(dispute_id, actor, DisputeStatus::UnderReview, |_| {})
      .await
  }

  pub async fn resolve_dispute(
    &self,
    dispute_id: Uuid,
    actor: &Actor,
    resolution: impl Into<String>,
    admin_notes: Option<String>,
  ) -> LifecycleResult<Dispute> {
    let resolution = resolution.into();
    if resolution.trim().is_empty() {
      return Err(LifecycleError::InvalidDispute("a resolution is required".to_string()));
    }
    self
      .change_dispute(dispute_id, actor, DisputeStatus::Resolved, move |d| {
        d.resolution = Some(resolution);
        if admin_notes.is_some() {
          d.admin_notes = admin_notes;
        }
      })
      .await
  }

  pub async fn close_dispute(&self, dispute_id: Uuid, actor: &Actor) -> LifecycleResult<Dispute> {
    self.change_dispute(dispute_id, actor, DisputeStatus::Closed, |_| {}).await
  }
}
