// demos/market_app/src/web/routes.rs

use crate::state::AppState;
use crate::web::handlers::{dispute_handlers, job_handlers, order_handlers};
use actix_web::web;

async fn health_check_handler(app_state: web::Data<AppState>) -> actix_web::HttpResponse {
  let storage = if app_state.config.database_url.is_some() { "postgres" } else { "memory" };
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok", "storage": storage }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/actions", web::get().to(order_handlers::order_actions_handler))
          .route("/{order_id}/transitions", web::post().to(order_handlers::transition_handler))
          .route("/{order_id}/payment", web::post().to(order_handlers::payment_handler))
          .route("/{order_id}/proof", web::post().to(order_handlers::proof_handler))
          .route("/{order_id}/confirm-items", web::post().to(order_handlers::confirm_items_handler))
          .route("/{order_id}/inspection", web::post().to(order_handlers::inspection_handler))
          .route("/{order_id}/disputes", web::post().to(dispute_handlers::open_dispute_handler))
          .route("/{order_id}/disputes", web::get().to(dispute_handlers::list_disputes_handler)),
      )
      .service(
        web::scope("/jobs")
          .route("/available", web::get().to(job_handlers::available_jobs_handler))
          .route("/{order_id}/claim", web::post().to(job_handlers::claim_job_handler)),
      )
      .service(
        web::scope("/disputes")
          .route("/{dispute_id}/review", web::post().to(dispute_handlers::review_dispute_handler))
          .route("/{dispute_id}/resolve", web::post().to(dispute_handlers::resolve_dispute_handler))
          .route("/{dispute_id}/close", web::post().to(dispute_handlers::close_dispute_handler)),
      ),
  );
}
