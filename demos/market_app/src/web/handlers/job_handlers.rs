// demos/market_app/src/web/handlers/job_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::Result;
use crate::state::AppState;
use crate::web::identity::Caller;

#[instrument(name = "handler::available_jobs", skip(app_state, _caller))]
pub async fn available_jobs_handler(app_state: web::Data<AppState>, _caller: Caller) -> Result<HttpResponse> {
  let jobs = app_state.manager.list_available_jobs().await?;
  Ok(HttpResponse::Ok().json(json!({ "jobs": jobs })))
}

#[instrument(name = "handler::claim_job", skip(app_state, path, caller), fields(order_id = %path.as_ref(), shopper_id = %caller.0.user_id))]
pub async fn claim_job_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  caller: Caller,
) -> Result<HttpResponse> {
  let job = app_state.manager.claim_job(path.into_inner(), &caller.0).await?;
  info!(order_id = %job.order_id, "Job claimed.");
  Ok(HttpResponse::Ok().json(json!({ "job": job })))
}
