use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use orderflow::{
  Actor, LifecycleConfig, MemoryStore, NewOrder, NullNotifier, Order, OrderItem, OrderLifecycleManager, OrderStatus,
  PaymentGate, TransitionPolicy, TransitionRequest,
};
use std::sync::Arc;
use tokio::runtime::Runtime;
use uuid::Uuid;

fn new_order(consumer: &Actor, vendor: &Actor, lines: usize) -> NewOrder {
  NewOrder {
    consumer_id: consumer.user_id,
    vendor_id: vendor.user_id,
    items: (0..lines)
      .map(|i| OrderItem::new(Uuid::new_v4(), format!("item {}", i), 2, 500))
      .collect(),
    special_instructions: None,
    order_number: None,
  }
}

fn bench_policy_evaluate(c: &mut Criterion) {
  let mut group = c.benchmark_group("PolicyEvaluate");
  let policy = TransitionPolicy::new();
  let consumer = Actor::consumer(Uuid::new_v4());
  let vendor = Actor::vendor(Uuid::new_v4());
  let admin = Actor::admin(Uuid::new_v4());
  let order = Order::create(new_order(&consumer, &vendor, 3), &Default::default(), chrono::Utc::now()).unwrap();

  group.throughput(Throughput::Elements(OrderStatus::ALL.len() as u64));
  for (label, actor) in [("vendor", &vendor), ("consumer", &consumer), ("admin", &admin)] {
    group.bench_with_input(BenchmarkId::new("all_targets", label), actor, |b, actor| {
      b.iter(|| {
        OrderStatus::ALL
          .into_iter()
          .filter(|&to| policy.evaluate(&order, None, actor, to, Some("audit")).is_ok())
          .count()
      })
    });
  }
  group.bench_function("available_actions_admin", |b| {
    b.iter(|| policy.available_actions(&order, None, &admin))
  });
  group.bench_function("payment_gate", |b| b.iter(|| PaymentGate::blockers(&order, None)));
  group.finish();
}

fn bench_manager_transitions(c: &mut Criterion) {
  let mut group = c.benchmark_group("ManagerTransitions");
  let rt = Runtime::new().unwrap();

  for lines in [1usize, 10, 50] {
    group.bench_with_input(BenchmarkId::new("create_accept_prepare", lines), &lines, |b, &lines| {
      let manager = OrderLifecycleManager::new(
        Arc::new(MemoryStore::new()),
        Arc::new(NullNotifier),
        LifecycleConfig::default(),
      );
      let consumer = Actor::consumer(Uuid::new_v4());
      let vendor = Actor::vendor(Uuid::new_v4());
      let (manager, vendor_ref) = (&manager, &vendor);
      b.to_async(&rt).iter_batched(
        || new_order(&consumer, vendor_ref, lines),
        move |input| async move {
          let (order, _) = manager.create_order(input).await.unwrap();
          let request = TransitionRequest::new(OrderStatus::Pending, OrderStatus::Accepted);
          manager.transition(order.id(), vendor_ref, request).await.unwrap();
          let request = TransitionRequest::new(OrderStatus::Accepted, OrderStatus::Preparing);
          manager.transition(order.id(), vendor_ref, request).await.unwrap()
        },
        BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

criterion_group!(benches, bench_policy_evaluate, bench_manager_transitions);
criterion_main!(benches);
