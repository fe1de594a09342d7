// demos/market_app/src/main.rs

mod config;
mod errors;
mod state;
mod store;
mod web;

use crate::config::AppConfig;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use orderflow::{BroadcastNotifier, OrderLifecycleManager};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

/// Stands in for the push/toast fan-out: every transition is logged once.
fn spawn_transition_log(notifier: &BroadcastNotifier) {
  let mut events = notifier.subscribe();
  tokio::spawn(async move {
    loop {
      match events.recv().await {
        Ok(event) => tracing::info!(
          target: "market_app::events",
          order_id = %event.order_id,
          from = %event.from,
          to = %event.to,
          role = %event.role,
          kind = ?event.kind,
          "Order transitioned."
        ),
        Err(RecvError::Lagged(skipped)) => {
          tracing::warn!(skipped, "Transition log fell behind, events dropped.");
        }
        Err(RecvError::Closed) => break,
      }
    }
  });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting market application server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };

  let order_store = match store::connect(&app_config).await {
    Ok(s) => s,
    Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
  };

  let notifier = BroadcastNotifier::new(app_config.notify_channel_capacity);
  spawn_transition_log(&notifier);

  let manager = OrderLifecycleManager::new(order_store, Arc::new(notifier), app_config.lifecycle());
  let app_state = AppState {
    manager: Arc::new(manager),
    config: app_config.clone(),
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
