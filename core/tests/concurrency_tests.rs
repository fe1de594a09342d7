// tests/concurrency_tests.rs
mod common;

use common::*;
use orderflow::{
  Actor, ContextData, LifecycleError, MutationCtx, OrderMutation, OrderStatus, OrderStore, Precondition,
  ShopperJobStatus, StepControl, StoreError, TransitionRequest,
};
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_same_token_concurrent_writes_have_one_winner() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;
  let vendor = &h.parties.vendor;

  let accept = h
    .manager
    .transition(order.id(), vendor, TransitionRequest::new(OrderStatus::Pending, OrderStatus::Accepted));
  let cancel = h
    .manager
    .transition(order.id(), vendor, TransitionRequest::new(OrderStatus::Pending, OrderStatus::Cancelled));
  let (accepted, cancelled) = tokio::join!(accept, cancel);

  let (winner, loser) = match (accepted, cancelled) {
    (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
    other => panic!("expected exactly one winner, got {:?}", other),
  };
  assert!(
    matches!(loser, LifecycleError::StaleState { expected: OrderStatus::Pending, .. }),
    "loser got {:?}",
    loser
  );
  assert!(loser.is_retryable());
  assert_eq!(h.reload(&order).await.status(), winner.order.status());
}

#[tokio::test]
#[serial]
async fn test_store_rejects_write_with_outdated_token() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;
  h.step(&order, &h.parties.vendor, OrderStatus::Accepted).await;

  let err = h.store.save_order(&order, OrderStatus::Pending).await.unwrap_err();
  match err {
    StoreError::Conflict { expected, actual } => {
      assert_eq!(expected, OrderStatus::Pending);
      assert_eq!(actual, OrderStatus::Accepted);
    }
    other => panic!("expected Conflict, got {:?}", other),
  }
  assert_eq!(h.reload(&order).await.status(), OrderStatus::Accepted);
}

#[tokio::test]
#[serial]
async fn test_stale_request_succeeds_after_reload() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;
  let vendor = &h.parties.vendor;
  let accepted = h.step(&order, vendor, OrderStatus::Accepted).await;

  // The caller still believes the order is pending.
  let err = h
    .manager
    .transition(order.id(), vendor, TransitionRequest::new(OrderStatus::Pending, OrderStatus::Preparing))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    LifecycleError::StaleState {
      expected: OrderStatus::Pending,
      actual: OrderStatus::Accepted
    }
  ));
  assert_eq!(h.reload(&order).await, accepted);

  let fresh = h.reload(&order).await;
  let preparing = h.step(&fresh, vendor, OrderStatus::Preparing).await;
  assert_eq!(preparing.status(), OrderStatus::Preparing);
}

#[tokio::test]
#[serial]
async fn test_only_one_shopper_claims_a_job() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;
  let first = Actor::shopper(Uuid::new_v4());
  let second = Actor::shopper(Uuid::new_v4());

  let (a, b) = tokio::join!(
    h.manager.claim_job(order.id(), &first),
    h.manager.claim_job(order.id(), &second)
  );
  let (job, err) = match (a, b) {
    (Ok(job), Err(e)) | (Err(e), Ok(job)) => (job, e),
    other => panic!("expected exactly one claim to win, got {:?}", other),
  };
  assert!(matches!(err, LifecycleError::PreconditionNotMet(Precondition::JobAlreadyClaimed)));
  assert_eq!(job.status, ShopperJobStatus::Accepted);

  let order = h.reload(&order).await;
  assert_eq!(order.shopper_id(), job.shopper_id);
  assert!(h.manager.list_available_jobs().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_claim_survives_concurrent_status_change() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;

  let (claimed, accepted) = tokio::join!(
    h.manager.claim_job(order.id(), &h.parties.shopper),
    h.manager.transition(
      order.id(),
      &h.parties.vendor,
      TransitionRequest::new(OrderStatus::Pending, OrderStatus::Accepted)
    )
  );
  claimed.unwrap();
  accepted.unwrap();

  let order = h.reload(&order).await;
  assert_eq!(order.status(), OrderStatus::Accepted);
  assert_eq!(order.shopper_id(), Some(h.parties.shopper.user_id));
}

#[tokio::test]
#[serial]
async fn test_store_outage_surfaces_as_persistence_unavailable() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;

  h.store.set_offline(true);
  let err = h
    .manager
    .transition(
      order.id(),
      &h.parties.vendor,
      TransitionRequest::new(OrderStatus::Pending, OrderStatus::Accepted),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, LifecycleError::PersistenceUnavailable(_)));
  assert!(err.is_retryable());
  assert!(matches!(
    h.manager.can_pay(order.id()).await.unwrap_err(),
    LifecycleError::PersistenceUnavailable(_)
  ));

  h.store.set_offline(false);
  assert_eq!(h.reload(&order).await.status(), OrderStatus::Pending);
}

#[tokio::test]
#[serial]
async fn test_unknown_order_is_not_found() {
  setup_tracing();
  let h = Harness::new();
  let missing = Uuid::new_v4();
  let err = h.manager.get_order(missing).await.unwrap_err();
  assert!(matches!(err, LifecycleError::NotFound { entity: "order", id } if id == missing));
  assert!(!err.is_retryable());
}

#[tokio::test]
#[serial]
async fn test_claim_cut_off_by_outage_is_finished_by_the_same_shopper() {
  setup_tracing();
  let mut h = Harness::new();
  let outage = OneShot::armed();
  let store = h.store.clone();
  h.manager.mutation_workflow_mut().before("commit", move |ctx: ContextData<MutationCtx>| {
    let outage = outage.clone();
    let store = store.clone();
    async move {
      if ctx.with(|c| matches!(c.mutation, OrderMutation::ClaimJob)) && outage.fire() {
        store.set_offline(true);
      }
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let (order, _) = h.create().await;
  let p = &h.parties;
  let err = h.manager.claim_job(order.id(), &p.shopper).await.unwrap_err();
  assert!(matches!(err, LifecycleError::PersistenceUnavailable(_)));
  h.store.set_offline(false);

  // The store was still down when the claim tried to let go of the job.
  let job = h.manager.get_shopper_job(order.id()).await.unwrap().unwrap();
  assert!(job.is_held_by(p.shopper.user_id));
  assert_eq!(h.reload(&order).await.shopper_id(), None);

  let rival = Actor::shopper(Uuid::new_v4());
  assert!(matches!(
    h.manager.claim_job(order.id(), &rival).await.unwrap_err(),
    LifecycleError::PreconditionNotMet(Precondition::JobAlreadyClaimed)
  ));

  let job = h.manager.claim_job(order.id(), &p.shopper).await.unwrap();
  assert_eq!(job.shopper_id, Some(p.shopper.user_id));
  let order = h.reload(&order).await;
  assert_eq!(order.shopper_id(), Some(p.shopper.user_id));

  let order = h.step(&order, &p.vendor, OrderStatus::Accepted).await;
  let order = h.step(&order, &p.vendor, OrderStatus::Preparing).await;
  let order = h.step(&order, &p.vendor, OrderStatus::Ready).await;
  let order = h.step(&order, &p.shopper, OrderStatus::PickedUp).await;
  assert_eq!(order.status(), OrderStatus::PickedUp);
  let job = h.manager.get_shopper_job(order.id()).await.unwrap().unwrap();
  assert_eq!(job.status, ShopperJobStatus::InProgress);
}

#[tokio::test]
#[serial]
async fn test_claim_on_order_cancelled_mid_claim_releases_the_job() {
  setup_tracing();
  let mut h = Harness::new();
  let (order, _) = h.create().await;
  let other = h.other_manager();
  let admin = h.parties.admin.clone();
  let cancel = OneShot::armed();
  h.manager.mutation_workflow_mut().before("commit", move |ctx: ContextData<MutationCtx>| {
    let other = other.clone();
    let admin = admin.clone();
    let cancel = cancel.clone();
    async move {
      let (is_claim, order_id) = ctx.with(|c| (matches!(c.mutation, OrderMutation::ClaimJob), c.order_id));
      if is_claim && cancel.fire() {
        other
          .transition(order_id, &admin, TransitionRequest::new(OrderStatus::Pending, OrderStatus::Cancelled))
          .await?;
      }
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let err = h.manager.claim_job(order.id(), &h.parties.shopper).await.unwrap_err();
  assert!(
    matches!(err, LifecycleError::TerminalState { status: OrderStatus::Cancelled }),
    "got {:?}",
    err
  );

  let order = h.reload(&order).await;
  assert_eq!(order.status(), OrderStatus::Cancelled);
  assert_eq!(order.shopper_id(), None);
  let job = h.manager.get_shopper_job(order.id()).await.unwrap().unwrap();
  assert!(job.is_claimable());
  assert_eq!(job.accepted_at, None);
}

#[tokio::test]
#[serial]
async fn test_job_write_failure_keeps_the_committed_transition() {
  setup_tracing();
  let mut h = Harness::new();
  let order = h.ready_claimed_order().await;
  let outage = OneShot::armed();
  let store = h.store.clone();
  h.manager.mutation_workflow_mut().before("sync_job", move |_ctx: ContextData<MutationCtx>| {
    let outage = outage.clone();
    let store = store.clone();
    async move {
      if outage.fire() {
        store.set_offline(true);
      }
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let outcome = h
    .manager
    .transition(
      order.id(),
      &h.parties.shopper,
      TransitionRequest::new(OrderStatus::Ready, OrderStatus::PickedUp),
    )
    .await
    .unwrap();
  h.store.set_offline(false);

  assert_eq!(outcome.order.status(), OrderStatus::PickedUp);
  assert_eq!(h.reload(&order).await.status(), OrderStatus::PickedUp);
  let job = h.manager.get_shopper_job(order.id()).await.unwrap().unwrap();
  assert_eq!(job.status, ShopperJobStatus::Accepted);
  assert_eq!(job.picked_up_at, None);
}
