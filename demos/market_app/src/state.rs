// demos/market_app/src/state.rs

use crate::config::AppConfig;
use orderflow::OrderLifecycleManager;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub manager: Arc<OrderLifecycleManager>,
  pub config: Arc<AppConfig>,
}
