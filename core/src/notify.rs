// orderflow/src/notify.rs

//! Fire-and-forget transition events for toasts and push fan-out.

use crate::model::{OrderStatus, Role};
use crate::policy::TransitionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{event, Level};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransitioned {
  pub order_id: Uuid,
  pub from: OrderStatus,
  pub to: OrderStatus,
  pub actor_id: Uuid,
  pub role: Role,
  pub kind: TransitionKind,
  pub at: DateTime<Utc>,
}

/// Publishing never fails from the caller's point of view and never blocks.
pub trait Notifier: Send + Sync {
  fn publish(&self, event: OrderTransitioned);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
  fn publish(&self, _event: OrderTransitioned) {}
}

/// Fans events out to any number of subscribers over a bounded broadcast
/// channel. Slow subscribers lose the oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
  sender: broadcast::Sender<OrderTransitioned>,
}

impl BroadcastNotifier {
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    Self { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<OrderTransitioned> {
    self.sender.subscribe()
  }
}

impl Notifier for BroadcastNotifier {
  fn publish(&self, transition: OrderTransitioned) {
    // Err only means nobody is listening.
    if let Ok(receivers) = self.sender.send(transition) {
      event!(Level::TRACE, receivers, "Transition event published.");
    }
  }
}
