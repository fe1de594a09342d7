// tests/dispute_tests.rs
mod common;

use common::*;
use orderflow::{
  Actor, ContextData, DisputeCtx, DisputeStatus, LifecycleError, Operation, OrderStatus, Role, StepControl,
  TransitionKind, TransitionRequest,
};
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_dispute_forces_disputed_and_resolution_does_not_restore() {
  setup_tracing();
  let h = Harness::new();
  let mut events = h.notifier.subscribe();
  let order = h.ready_claimed_order().await;
  let p = &h.parties;
  let order = h.step(&order, &p.shopper, OrderStatus::PickedUp).await;
  while events.try_recv().is_ok() {}

  let (dispute, disputed) = h
    .manager
    .open_dispute(order.id(), &p.consumer, "missing_item", "The basil never arrived.")
    .await
    .unwrap();
  assert_eq!(disputed.status(), OrderStatus::Disputed);
  assert_eq!(dispute.status, DisputeStatus::Open);
  assert_eq!(dispute.reporter_id, p.consumer.user_id);

  let event = events.recv().await.unwrap();
  assert_eq!(event.from, OrderStatus::PickedUp);
  assert_eq!(event.to, OrderStatus::Disputed);
  assert_eq!(event.kind, TransitionKind::Dispute);
  assert_eq!(event.role, Role::Consumer);

  let reviewed = h.manager.review_dispute(dispute.id, &p.admin).await.unwrap();
  assert_eq!(reviewed.status, DisputeStatus::UnderReview);
  let resolved = h
    .manager
    .resolve_dispute(dispute.id, &p.admin, "vendor refunds the basil", Some("first offence".to_string()))
    .await
    .unwrap();
  assert_eq!(resolved.status, DisputeStatus::Resolved);
  assert_eq!(resolved.resolution.as_deref(), Some("vendor refunds the basil"));
  assert_eq!(h.reload(&order).await.status(), OrderStatus::Disputed);

  // The disposition is a separate, explicit admin move.
  let outcome = h
    .manager
    .transition(
      order.id(),
      &p.admin,
      TransitionRequest::new(OrderStatus::Disputed, OrderStatus::Cancelled),
    )
    .await
    .unwrap();
  assert_eq!(outcome.order.status(), OrderStatus::Cancelled);

  let closed = h.manager.close_dispute(dispute.id, &p.admin).await.unwrap();
  assert_eq!(closed.status, DisputeStatus::Closed);
  assert_eq!(h.manager.list_disputes(order.id()).await.unwrap(), vec![closed]);
}

#[tokio::test]
#[serial]
async fn test_disputed_order_blocks_normal_flow() {
  setup_tracing();
  let h = Harness::new();
  let order = h.ready_claimed_order().await;
  let p = &h.parties;
  h.manager
    .open_dispute(order.id(), &p.vendor, "no_show", "Shopper did not come.")
    .await
    .unwrap();

  let err = h
    .manager
    .transition(
      order.id(),
      &p.shopper,
      TransitionRequest::new(OrderStatus::Disputed, OrderStatus::PickedUp),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, LifecycleError::InvalidFromState { .. }));
}

#[tokio::test]
#[serial]
async fn test_dispute_on_terminal_order_keeps_status() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;
  let cancelled = h.step(&order, &h.parties.vendor, OrderStatus::Cancelled).await;

  let (dispute, after) = h
    .manager
    .open_dispute(order.id(), &h.parties.consumer, "refund", "Still charged.")
    .await
    .unwrap();
  assert_eq!(dispute.status, DisputeStatus::Open);
  assert_eq!(after.status(), OrderStatus::Cancelled);
  assert_eq!(h.reload(&order).await, cancelled);
}

#[tokio::test]
#[serial]
async fn test_second_dispute_leaves_order_disputed() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;
  let p = &h.parties;
  h.manager.open_dispute(order.id(), &p.consumer, "quality", "first").await.unwrap();
  let (_, after) = h.manager.open_dispute(order.id(), &p.vendor, "quality", "second").await.unwrap();
  assert_eq!(after.status(), OrderStatus::Disputed);
  assert_eq!(h.manager.list_disputes(order.id()).await.unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn test_outsiders_cannot_open_or_manage_disputes() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;
  let stranger = Actor::consumer(Uuid::new_v4());

  let err = h
    .manager
    .open_dispute(order.id(), &stranger, "quality", "not mine")
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    LifecycleError::OperationNotPermitted {
      operation: Operation::OpenDispute,
      ..
    }
  ));
  assert_eq!(h.reload(&order).await.status(), OrderStatus::Pending);

  let err = h
    .manager
    .open_dispute(order.id(), &h.parties.consumer, "quality", "   ")
    .await
    .unwrap_err();
  assert!(matches!(err, LifecycleError::InvalidDispute(_)));

  let (dispute, _) = h
    .manager
    .open_dispute(order.id(), &h.parties.consumer, "quality", "soft tomatoes")
    .await
    .unwrap();
  let err = h.manager.review_dispute(dispute.id, &h.parties.vendor).await.unwrap_err();
  assert!(matches!(
    err,
    LifecycleError::OperationNotPermitted {
      operation: Operation::ManageDispute,
      ..
    }
  ));
}

#[tokio::test]
#[serial]
async fn test_dispute_status_moves_forward_only() {
  setup_tracing();
  let h = Harness::new();
  let (order, _) = h.create().await;
  let admin = &h.parties.admin;
  let (dispute, _) = h
    .manager
    .open_dispute(order.id(), &h.parties.consumer, "quality", "soft tomatoes")
    .await
    .unwrap();

  let err = h.manager.close_dispute(dispute.id, admin).await.unwrap_err();
  assert!(matches!(
    err,
    LifecycleError::InvalidDisputeTransition {
      from: DisputeStatus::Open,
      to: DisputeStatus::Closed
    }
  ));

  let err = h.manager.resolve_dispute(dispute.id, admin, "  ", None).await.unwrap_err();
  assert!(matches!(err, LifecycleError::InvalidDispute(_)));

  h.manager.resolve_dispute(dispute.id, admin, "replaced", None).await.unwrap();
  let err = h.manager.review_dispute(dispute.id, admin).await.unwrap_err();
  assert!(matches!(err, LifecycleError::InvalidDisputeTransition { .. }));
}

#[tokio::test]
#[serial]
async fn test_dispute_that_is_not_filed_restores_the_order() {
  setup_tracing();
  let mut h = Harness::new();
  let order = h.ready_claimed_order().await;
  let order = h.step(&order, &h.parties.shopper, OrderStatus::PickedUp).await;
  let refuse = OneShot::armed();
  h.manager.dispute_workflow_mut().before("file", move |_ctx: ContextData<DisputeCtx>| {
    let refuse = refuse.clone();
    async move {
      if refuse.fire() {
        return Err(LifecycleError::InvalidDispute("attachment rejected".to_string()));
      }
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let p = &h.parties;
  let err = h
    .manager
    .open_dispute(order.id(), &p.consumer, "damaged", "The box was crushed.")
    .await
    .unwrap_err();
  assert!(matches!(err, LifecycleError::InvalidDispute(_)));
  assert_eq!(h.reload(&order).await.status(), OrderStatus::PickedUp);
  assert!(h.manager.list_disputes(order.id()).await.unwrap().is_empty());

  let (dispute, disputed) = h
    .manager
    .open_dispute(order.id(), &p.consumer, "damaged", "The box was crushed.")
    .await
    .unwrap();
  assert_eq!(dispute.status, DisputeStatus::Open);
  assert_eq!(disputed.status(), OrderStatus::Disputed);
}

#[tokio::test]
#[serial]
async fn test_dispute_filing_outage_leaves_order_disputed_for_admin() {
  setup_tracing();
  let mut h = Harness::new();
  let order = h.ready_claimed_order().await;
  let order = h.step(&order, &h.parties.shopper, OrderStatus::PickedUp).await;
  let outage = OneShot::armed();
  let store = h.store.clone();
  h.manager.dispute_workflow_mut().before("file", move |_ctx: ContextData<DisputeCtx>| {
    let outage = outage.clone();
    let store = store.clone();
    async move {
      if outage.fire() {
        store.set_offline(true);
      }
      Ok::<_, LifecycleError>(StepControl::Continue)
    }
  });

  let p = &h.parties;
  let err = h
    .manager
    .open_dispute(order.id(), &p.vendor, "no_show", "Shopper never came back.")
    .await
    .unwrap_err();
  assert!(matches!(err, LifecycleError::PersistenceUnavailable(_)));
  h.store.set_offline(false);

  // Neither the record nor the status rollback could be written.
  let order = h.reload(&order).await;
  assert_eq!(order.status(), OrderStatus::Disputed);
  assert!(h.manager.list_disputes(order.id()).await.unwrap().is_empty());

  let order = h.step(&order, &p.admin, OrderStatus::Cancelled).await;
  assert_eq!(order.status(), OrderStatus::Cancelled);
}
