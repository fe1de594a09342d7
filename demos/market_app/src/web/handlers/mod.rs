// demos/market_app/src/web/handlers/mod.rs

pub mod dispute_handlers;
pub mod job_handlers;
pub mod order_handlers;
