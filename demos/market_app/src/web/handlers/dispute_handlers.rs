// demos/market_app/src/web/handlers/dispute_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::Result;
use crate::state::AppState;
use crate::web::identity::Caller;

#[derive(Deserialize, Debug)]
pub struct OpenDisputePayload {
  pub category: String,
  pub description: String,
}

#[instrument(name = "handler::open_dispute", skip(app_state, path, payload, caller), fields(order_id = %path.as_ref()))]
pub async fn open_dispute_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<OpenDisputePayload>,
  caller: Caller,
) -> Result<HttpResponse> {
  let OpenDisputePayload { category, description } = payload.into_inner();
  let (dispute, order) = app_state
    .manager
    .open_dispute(path.into_inner(), &caller.0, category, description)
    .await?;
  Ok(HttpResponse::Created().json(json!({ "dispute": dispute, "order": order })))
}

#[instrument(name = "handler::list_disputes", skip(app_state, path, _caller), fields(order_id = %path.as_ref()))]
pub async fn list_disputes_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  _caller: Caller,
) -> Result<HttpResponse> {
  let disputes = app_state.manager.list_disputes(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "disputes": disputes })))
}

#[instrument(name = "handler::review_dispute", skip(app_state, path, caller), fields(dispute_id = %path.as_ref()))]
pub async fn review_dispute_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  caller: Caller,
) -> Result<HttpResponse> {
  let dispute = app_state.manager.review_dispute(path.into_inner(), &caller.0).await?;
  Ok(HttpResponse::Ok().json(json!({ "dispute": dispute })))
}

#[derive(Deserialize, Debug)]
pub struct ResolveDisputePayload {
  pub resolution: String,
  #[serde(default)]
  pub admin_notes: Option<String>,
}

#[instrument(name = "handler::resolve_dispute", skip(app_state, path, payload, caller), fields(dispute_id = %path.as_ref()))]
pub async fn resolve_dispute_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<ResolveDisputePayload>,
  caller: Caller,
) -> Result<HttpResponse> {
  let ResolveDisputePayload { resolution, admin_notes } = payload.into_inner();
  let dispute = app_state
    .manager
    .resolve_dispute(path.into_inner(), &caller.0, resolution, admin_notes)
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "dispute": dispute })))
}

#[instrument(name = "handler::close_dispute", skip(app_state, path, caller), fields(dispute_id = %path.as_ref()))]
pub async fn close_dispute_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  caller: Caller,
) -> Result<HttpResponse> {
  let dispute = app_state.manager.close_dispute(path.into_inner(), &caller.0).await?;
  Ok(HttpResponse::Ok().json(json!({ "dispute": dispute })))
}
