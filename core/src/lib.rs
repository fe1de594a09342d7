// orderflow/src/lib.rs

//! Orderflow: the order lifecycle core of a multi-role local market.
//!
//! An order moves through a fixed set of statuses, driven by four roles
//! (consumer, vendor, shopper, admin). This crate decides which moves are
//! legal, when payment may be offered, and how concurrent writers are kept
//! from overwriting each other:
//!  - [`TransitionPolicy`]: the single authority over status moves.
//!  - [`PaymentGate`]: whether "Pay Now" is available, and why not.
//!  - [`OrderLifecycleManager`]: loads, checks, commits and announces
//!    mutations through named workflow steps that embedders can hook into.
//!  - [`OrderStore`]: the persistence boundary, with compare-and-swap writes
//!    keyed on the order status.

pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod notify;
pub mod payment;
pub mod policy;
pub mod store;
pub mod workflow;

pub use crate::config::LifecycleConfig;
pub use crate::error::{EngineError, LifecycleError, LifecycleResult, Operation, Precondition, RoleList};
pub use crate::manager::{DisputeCtx, MutationCtx, MutationOutcome, OrderLifecycleManager, OrderMutation};
pub use crate::model::{
  Actor, Dispute, DisputeStatus, FeePolicy, InspectionStatus, NewOrder, Order, OrderItem, OrderStatus, Role,
  ShopperJob, ShopperJobStatus,
};
pub use crate::notify::{BroadcastNotifier, Notifier, NullNotifier, OrderTransitioned};
pub use crate::payment::{PaymentBlocker, PaymentGate};
pub use crate::policy::{Approval, AvailableAction, TransitionKind, TransitionPolicy, TransitionRequest};
pub use crate::store::{MemoryStore, OrderStore, StoreError};
pub use crate::workflow::{ContextData, StepControl, Workflow, WorkflowOutcome};
