// demos/market_app/src/store/pg.rs

use async_trait::async_trait;
use orderflow::{Dispute, Order, OrderStatus, OrderStore, ShopperJob, ShopperJobStatus, StoreError};
use sqlx::types::Json;
use sqlx::PgPool;
use std::str::FromStr;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// `OrderStore` over the tables in `schema.sql`. The status column is the
/// compare-and-swap token; the JSONB `doc` column holds the record.
#[derive(Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

fn db_err(e: sqlx::Error) -> StoreError {
  if let Some(db) = e.as_database_error() {
    if db.is_unique_violation() {
      return StoreError::Duplicate;
    }
  }
  if matches!(e, sqlx::Error::RowNotFound) {
    return StoreError::NotFound;
  }
  StoreError::unavailable(e)
}

fn parse_status<T: FromStr<Err = String>>(raw: &str) -> Result<T, StoreError> {
  T::from_str(raw).map_err(|e| StoreError::unavailable(anyhow::anyhow!("corrupt status column: {}", e)))
}

#[async_trait]
impl OrderStore for PgOrderStore {
  async fn load_order(&self, id: Uuid) -> Result<Order, StoreError> {
    let row: Option<(Json<Order>,)> = sqlx::query_as("SELECT doc FROM orders WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)?;
    row.map(|(Json(order),)| order).ok_or(StoreError::NotFound)
  }

  async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO orders (id, order_number, status, consumer_id, vendor_id, created_at, updated_at, doc) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(order.id())
    .bind(order.order_number())
    .bind(order.status().as_str())
    .bind(order.consumer_id)
    .bind(order.vendor_id)
    .bind(order.created_at())
    .bind(order.updated_at())
    .bind(Json(order))
    .execute(&self.pool)
    .await
    .map_err(db_err)?;
    Ok(())
  }

  #[instrument(name = "PgOrderStore::save_order", skip_all, fields(order_id = %order.id(), expected = %expected_prior_status))]
  async fn save_order(&self, order: &Order, expected_prior_status: OrderStatus) -> Result<Order, StoreError> {
    let updated: Option<(Json<Order>,)> = sqlx::query_as(
      "UPDATE orders SET status = $3, updated_at = $4, doc = $5 \
       WHERE id = $1 AND status = $2 RETURNING doc",
    )
    .bind(order.id())
    .bind(expected_prior_status.as_str())
    .bind(order.status().as_str())
    .bind(order.updated_at())
    .bind(Json(order))
    .fetch_optional(&self.pool)
    .await
    .map_err(db_err)?;

    if let Some((Json(saved),)) = updated {
      return Ok(saved);
    }

    // Zero rows: either the order is gone or someone moved it first.
    let current: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
      .bind(order.id())
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)?;
    match current {
      None => Err(StoreError::NotFound),
      Some((raw,)) => {
        let actual: OrderStatus = parse_status(&raw)?;
        event!(Level::DEBUG, %actual, "Conditional order update matched no row.");
        Err(StoreError::Conflict {
          expected: expected_prior_status,
          actual,
        })
      }
    }
  }

  async fn load_shopper_job(&self, order_id: Uuid) -> Result<Option<ShopperJob>, StoreError> {
    let row: Option<(Json<ShopperJob>,)> = sqlx::query_as("SELECT doc FROM shopper_jobs WHERE order_id = $1")
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)?;
    Ok(row.map(|(Json(job),)| job))
  }

  async fn insert_shopper_job(&self, job: &ShopperJob) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO shopper_jobs (order_id, status, shopper_id, doc) VALUES ($1, $2, $3, $4)")
      .bind(job.order_id)
      .bind(job.status.as_str())
      .bind(job.shopper_id)
      .bind(Json(job))
      .execute(&self.pool)
      .await
      .map_err(db_err)?;
    Ok(())
  }

  async fn save_shopper_job(
    &self,
    job: &ShopperJob,
    expected_prior_status: ShopperJobStatus,
  ) -> Result<ShopperJob, StoreError> {
    let updated: Option<(Json<ShopperJob>,)> = sqlx::query_as(
      "UPDATE shopper_jobs SET status = $3, shopper_id = $4, doc = $5 \
       WHERE order_id = $1 AND status = $2 RETURNING doc",
    )
    .bind(job.order_id)
    .bind(expected_prior_status.as_str())
    .bind(job.status.as_str())
    .bind(job.shopper_id)
    .bind(Json(job))
    .fetch_optional(&self.pool)
    .await
    .map_err(db_err)?;

    if let Some((Json(saved),)) = updated {
      return Ok(saved);
    }
    let current: Option<(String,)> = sqlx::query_as("SELECT status FROM shopper_jobs WHERE order_id = $1")
      .bind(job.order_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)?;
    match current {
      None => Err(StoreError::NotFound),
      Some((raw,)) => Err(StoreError::JobConflict {
        expected: expected_prior_status,
        actual: parse_status(&raw)?,
      }),
    }
  }

  async fn list_available_jobs(&self) -> Result<Vec<ShopperJob>, StoreError> {
    let rows: Vec<(Json<ShopperJob>,)> = sqlx::query_as(
      "SELECT j.doc FROM shopper_jobs j JOIN orders o ON o.id = j.order_id \
       WHERE j.status = 'available' AND j.shopper_id IS NULL \
         AND o.status NOT IN ('completed', 'cancelled') \
       ORDER BY o.created_at ASC",
    )
    .fetch_all(&self.pool)
    .await
    .map_err(db_err)?;
    Ok(rows.into_iter().map(|(Json(job),)| job).collect())
  }

  async fn create_dispute(&self, dispute: &Dispute) -> Result<Dispute, StoreError> {
    sqlx::query("INSERT INTO disputes (id, order_id, status, created_at, doc) VALUES ($1, $2, $3, $4, $5)")
      .bind(dispute.id)
      .bind(dispute.order_id)
      .bind(dispute.status.as_str())
      .bind(dispute.created_at)
      .bind(Json(dispute))
      .execute(&self.pool)
      .await
      .map_err(db_err)?;
    Ok(dispute.clone())
  }

  async fn load_dispute(&self, id: Uuid) -> Result<Dispute, StoreError> {
    let row: Option<(Json<Dispute>,)> = sqlx::query_as("SELECT doc FROM disputes WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)?;
    row.map(|(Json(dispute),)| dispute).ok_or(StoreError::NotFound)
  }

  async fn save_dispute(&self, dispute: &Dispute) -> Result<Dispute, StoreError> {
    let updated: Option<(Json<Dispute>,)> =
      sqlx::query_as("UPDATE disputes SET status = $2, doc = $3 WHERE id = $1 RETURNING doc")
        .bind(dispute.id)
        .bind(dispute.status.as_str())
        .bind(Json(dispute))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
    updated.map(|(Json(saved),)| saved).ok_or(StoreError::NotFound)
  }

  async fn list_disputes(&self, order_id: Uuid) -> Result<Vec<Dispute>, StoreError> {
    let rows: Vec<(Json<Dispute>,)> =
      sqlx::query_as("SELECT doc FROM disputes WHERE order_id = $1 ORDER BY created_at ASC")
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
    Ok(rows.into_iter().map(|(Json(dispute),)| dispute).collect())
  }
}
