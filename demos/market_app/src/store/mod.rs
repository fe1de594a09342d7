// demos/market_app/src/store/mod.rs

pub mod pg;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use orderflow::{MemoryStore, OrderStore};
use std::sync::Arc;

pub use pg::PgOrderStore;

/// Postgres when `DATABASE_URL` is set, otherwise the in-process store.
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn OrderStore>> {
  match config.database_url.as_deref() {
    Some(url) => {
      let pool = sqlx::PgPool::connect(url).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to the database.");
        AppError::Sqlx(e)
      })?;
      tracing::info!("Successfully connected to the database.");
      Ok(Arc::new(PgOrderStore::new(pool)))
    }
    None => {
      tracing::warn!("DATABASE_URL not set, orders are kept in memory only.");
      Ok(Arc::new(MemoryStore::new()))
    }
  }
}
