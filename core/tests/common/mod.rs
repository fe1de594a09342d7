// tests/common/mod.rs
#![allow(dead_code)]

use orderflow::{
  Actor, BroadcastNotifier, ContextData, EngineError, LifecycleConfig, MemoryStore, NewOrder, Order, OrderItem,
  NullNotifier, OrderLifecycleManager, OrderStatus, OrderStore, ShopperJob, StepControl, TransitionRequest,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

// --- Workflow engine fixtures ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub message: String,
  pub steps_executed: Vec<String>,
  pub halt_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("engine error: {0}")]
  Engine(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<EngineError> for TestError {
  fn from(e: EngineError) -> Self {
    TestError::Engine(format!("{:?}", e))
  }
}

pub fn create_simple_handler(
  step_name: &'static str,
  message_to_append: &'static str,
) -> orderflow::workflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.message.push_str(message_to_append);
      guard.steps_executed.push(step_name.to_string());
      tracing::debug!(target: "test_handlers", step = step_name, counter = guard.counter, "executed");
      if guard.halt_at.as_deref() == Some(step_name) {
        return Ok(StepControl::Halt);
      }
      Ok(StepControl::Continue)
    })
  })
}

pub fn create_failing_handler(
  step_name: &'static str,
  error_message: &'static str,
) -> orderflow::workflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      tracing::warn!(target: "test_handlers", step = step_name, "failing with: '{}'", error_message);
      Err(TestError::Handler(error_message.to_string()))
    })
  })
}

// --- Tracing ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Failure injection ---
/// Fires once; hooks use it so a retried call runs clean.
#[derive(Clone, Default)]
pub struct OneShot(Arc<AtomicBool>);

impl OneShot {
  pub fn armed() -> Self {
    Self(Arc::new(AtomicBool::new(true)))
  }

  pub fn fire(&self) -> bool {
    self.0.swap(false, Ordering::SeqCst)
  }
}

// --- Lifecycle fixtures ---
pub struct Parties {
  pub consumer: Actor,
  pub vendor: Actor,
  pub shopper: Actor,
  pub admin: Actor,
}

impl Parties {
  pub fn new() -> Self {
    Self {
      consumer: Actor::consumer(Uuid::new_v4()),
      vendor: Actor::vendor(Uuid::new_v4()),
      shopper: Actor::shopper(Uuid::new_v4()),
      admin: Actor::admin(Uuid::new_v4()),
    }
  }
}

pub struct Harness {
  pub store: Arc<MemoryStore>,
  pub notifier: BroadcastNotifier,
  pub manager: OrderLifecycleManager,
  pub parties: Parties,
}

impl Harness {
  pub fn new() -> Self {
    Self::with_config(LifecycleConfig::default())
  }

  pub fn with_config(config: LifecycleConfig) -> Self {
    let store = Arc::new(MemoryStore::new());
    let notifier = BroadcastNotifier::new(64);
    let manager = OrderLifecycleManager::new(store.clone(), Arc::new(notifier.clone()), config);
    Self {
      store,
      notifier,
      manager,
      parties: Parties::new(),
    }
  }

  /// 2 x 5.00 and 1 x 3.50: subtotal 13.50, fee 1.35, total 14.85.
  pub fn new_order(&self) -> NewOrder {
    NewOrder {
      consumer_id: self.parties.consumer.user_id,
      vendor_id: self.parties.vendor.user_id,
      items: vec![
        OrderItem::new(Uuid::new_v4(), "Tomatoes", 2, 500),
        OrderItem::new(Uuid::new_v4(), "Basil", 1, 350),
      ],
      special_instructions: Some("ripe ones please".to_string()),
      order_number: None,
    }
  }

  pub async fn create(&self) -> (Order, ShopperJob) {
    self.manager.create_order(self.new_order()).await.expect("order should be created")
  }

  /// Another process sharing this store, for writes that land mid-workflow.
  pub fn other_manager(&self) -> Arc<OrderLifecycleManager> {
    Arc::new(OrderLifecycleManager::new(
      self.store.clone(),
      Arc::new(NullNotifier),
      LifecycleConfig::default(),
    ))
  }

  /// Writes straight to the store, bypassing the lifecycle rules.
  pub async fn store_save(&self, order: &Order) -> Order {
    self.store.save_order(order, order.status()).await.expect("store write")
  }

  pub async fn reload(&self, order: &Order) -> Order {
    self.manager.get_order(order.id()).await.expect("order should load")
  }

  pub async fn step(&self, order: &Order, actor: &Actor, to: OrderStatus) -> Order {
    self
      .manager
      .transition(order.id(), actor, TransitionRequest::new(order.status(), to))
      .await
      .unwrap_or_else(|e| panic!("{} -> {} by {:?} failed: {}", order.status(), to, actor.roles, e))
      .order
  }

  /// Vendor has the order ready and the shopper has claimed its job.
  pub async fn ready_claimed_order(&self) -> Order {
    let (order, _) = self.create().await;
    let p = &self.parties;
    let order = self.step(&order, &p.vendor, OrderStatus::Accepted).await;
    let order = self.step(&order, &p.vendor, OrderStatus::Preparing).await;
    let order = self.step(&order, &p.vendor, OrderStatus::Ready).await;
    self.manager.claim_job(order.id(), &p.shopper).await.expect("claim");
    self.reload(&order).await
  }

  /// Picked up, proof attached by the shopper, handed over for inspection.
  pub async fn inspecting_order(&self) -> Order {
    let order = self.ready_claimed_order().await;
    let p = &self.parties;
    let order = self.step(&order, &p.shopper, OrderStatus::PickedUp).await;
    self
      .manager
      .attach_proof(order.id(), &p.shopper, "receipts/ord-1.jpg")
      .await
      .expect("proof");
    let order = self.reload(&order).await;
    self.step(&order, &p.shopper, OrderStatus::Inspecting).await
  }
}
