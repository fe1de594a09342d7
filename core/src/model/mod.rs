// orderflow/src/model/mod.rs

//! Orders, their lines, shopper jobs, disputes and the actors acting on them.

pub mod actor;
pub mod dispute;
pub mod order;
pub mod shopper_job;

pub use actor::{Actor, Role};
pub use dispute::{Dispute, DisputeStatus};
pub use order::{FeePolicy, InspectionStatus, NewOrder, Order, OrderItem, OrderStatus};
pub use shopper_job::{ShopperJob, ShopperJobStatus};
