// demos/market_app/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use orderflow::{
  LifecycleError, MutationOutcome, NewOrder, Operation, Order, OrderItem, OrderStatus, Role, ShopperJob,
  TransitionRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::state::AppState;
use crate::web::identity::Caller;

#[derive(Serialize)]
struct ItemView<'a> {
  #[serde(flatten)]
  item: &'a OrderItem,
  total_price_cents: i64,
}

/// The order with each line's total computed on the way out.
pub(crate) fn order_body(order: &Order, job: Option<&ShopperJob>) -> serde_json::Value {
  let items: Vec<ItemView<'_>> = order
    .items
    .iter()
    .map(|item| ItemView {
      item,
      total_price_cents: item.total_price_cents(),
    })
    .collect();
  json!({
    "order": order,
    "items": items,
    "job": job,
  })
}

fn outcome_body(outcome: &MutationOutcome) -> serde_json::Value {
  let mut body = order_body(&outcome.order, outcome.job.as_ref());
  body["transition"] = json!(outcome.approval);
  body
}

#[derive(Deserialize, Debug)]
pub struct CreateOrderPayload {
  pub vendor_id: Uuid,
  pub items: Vec<OrderItem>,
  #[serde(default)]
  pub special_instructions: Option<String>,
}

#[instrument(name = "handler::create_order", skip(app_state, payload, caller), fields(user_id = %caller.0.user_id))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateOrderPayload>,
  caller: Caller,
) -> Result<HttpResponse> {
  let Caller(actor) = caller;
  if !actor.has_role(Role::Consumer) {
    return Err(
      LifecycleError::OperationNotPermitted {
        actor_id: actor.user_id,
        operation: Operation::PlaceOrder,
      }
      .into(),
    );
  }
  let payload = payload.into_inner();
  let (order, job) = app_state
    .manager
    .create_order(NewOrder {
      consumer_id: actor.user_id,
      vendor_id: payload.vendor_id,
      items: payload.items,
      special_instructions: payload.special_instructions,
      order_number: None,
    })
    .await?;
  info!(order_id = %order.id(), "Order placed.");
  Ok(HttpResponse::Created().json(order_body(&order, Some(&job))))
}

#[instrument(name = "handler::get_order", skip(app_state, path, _caller), fields(order_id = %path.as_ref()))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  _caller: Caller,
) -> Result<HttpResponse> {
  let order_id = path.into_inner();
  let order = app_state.manager.get_order(order_id).await?;
  let job = app_state.manager.get_shopper_job(order_id).await?;
  Ok(HttpResponse::Ok().json(order_body(&order, job.as_ref())))
}

#[instrument(name = "handler::order_actions", skip(app_state, path, caller), fields(order_id = %path.as_ref()))]
pub async fn order_actions_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  caller: Caller,
) -> Result<HttpResponse> {
  let order_id = path.into_inner();
  let actions = app_state.manager.available_actions(order_id, &caller.0).await?;
  let blockers = app_state.manager.payment_blockers(order_id).await?;
  let reasons: Vec<String> = blockers.iter().map(ToString::to_string).collect();
  Ok(HttpResponse::Ok().json(json!({
    "actions": actions,
    "can_pay": blockers.is_empty(),
    "payment_blockers": blockers,
    "payment_blocker_reasons": reasons,
  })))
}

#[instrument(name = "handler::transition", skip(app_state, path, request, caller), fields(order_id = %path.as_ref(), to = %request.to))]
pub async fn transition_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  request: web::Json<TransitionRequest>,
  caller: Caller,
) -> Result<HttpResponse> {
  let outcome = app_state
    .manager
    .transition(path.into_inner(), &caller.0, request.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(outcome_body(&outcome)))
}

#[derive(Deserialize, Debug)]
pub struct PaymentPayload {
  pub expected_status: OrderStatus,
}

#[instrument(name = "handler::pay", skip(app_state, path, payload, caller), fields(order_id = %path.as_ref()))]
pub async fn payment_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<PaymentPayload>,
  caller: Caller,
) -> Result<HttpResponse> {
  let outcome = app_state
    .manager
    .pay(path.into_inner(), &caller.0, payload.expected_status)
    .await?;
  info!(order_id = %outcome.order.id(), total_cents = outcome.order.total_cents(), "Payment confirmed.");
  Ok(HttpResponse::Ok().json(outcome_body(&outcome)))
}

#[derive(Deserialize, Debug)]
pub struct ProofPayload {
  pub reference: String,
}

#[instrument(name = "handler::attach_proof", skip(app_state, path, payload, caller), fields(order_id = %path.as_ref()))]
pub async fn proof_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<ProofPayload>,
  caller: Caller,
) -> Result<HttpResponse> {
  let reference = payload.into_inner().reference;
  if reference.trim().is_empty() {
    return Err(AppError::Validation("reference must not be empty.".to_string()));
  }
  let outcome = app_state
    .manager
    .attach_proof(path.into_inner(), &caller.0, reference)
    .await?;
  Ok(HttpResponse::Ok().json(outcome_body(&outcome)))
}

#[instrument(name = "handler::confirm_items", skip(app_state, path, caller), fields(order_id = %path.as_ref()))]
pub async fn confirm_items_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  caller: Caller,
) -> Result<HttpResponse> {
  let outcome = app_state.manager.confirm_all_items(path.into_inner(), &caller.0).await?;
  Ok(HttpResponse::Ok().json(outcome_body(&outcome)))
}

#[derive(Deserialize, Debug)]
pub struct InspectionPayload {
  pub approved: bool,
  #[serde(default)]
  pub notes: Option<String>,
}

#[instrument(name = "handler::inspection", skip(app_state, path, payload, caller), fields(order_id = %path.as_ref(), approved = payload.approved))]
pub async fn inspection_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<InspectionPayload>,
  caller: Caller,
) -> Result<HttpResponse> {
  let InspectionPayload { approved, notes } = payload.into_inner();
  let outcome = app_state
    .manager
    .record_inspection(path.into_inner(), &caller.0, approved, notes)
    .await?;
  Ok(HttpResponse::Ok().json(outcome_body(&outcome)))
}
