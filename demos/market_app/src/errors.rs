// demos/market_app/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use orderflow::LifecycleError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error(transparent)]
  Lifecycle(#[from] LifecycleError),
}

impl AppError {
  /// Stable machine-readable code for clients.
  fn code(&self) -> &'static str {
    match self {
      AppError::Validation(_) => "validation",
      AppError::Auth(_) => "unauthenticated",
      AppError::Config(_) => "configuration",
      AppError::Sqlx(_) => "database",
      AppError::Lifecycle(e) => match e {
        LifecycleError::InvalidActorForTransition { .. } => "invalid_actor_for_transition",
        LifecycleError::InvalidFromState { .. } => "invalid_from_state",
        LifecycleError::PreconditionNotMet(_) => "precondition_not_met",
        LifecycleError::TerminalState { .. } => "terminal_state",
        LifecycleError::StaleState { .. } => "stale_state",
        LifecycleError::OperationNotPermitted { .. } => "operation_not_permitted",
        LifecycleError::InvalidDisputeTransition { .. } => "invalid_dispute_transition",
        LifecycleError::NotFound { .. } => "not_found",
        LifecycleError::InvalidOrder(_) => "invalid_order",
        LifecycleError::InvalidDispute(_) => "invalid_dispute",
        LifecycleError::PersistenceUnavailable(_) => "persistence_unavailable",
        LifecycleError::Engine(_) => "internal",
      },
    }
  }

  fn message(&self) -> String {
    match self {
      AppError::Validation(m) | AppError::Auth(m) => m.clone(),
      AppError::Config(_) | AppError::Sqlx(_) => "An internal error occurred.".to_string(),
      AppError::Lifecycle(e) => e.user_message(),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Config(_) | AppError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Lifecycle(e) => match e {
        LifecycleError::InvalidActorForTransition { .. } | LifecycleError::OperationNotPermitted { .. } => {
          StatusCode::FORBIDDEN
        }
        LifecycleError::InvalidFromState { .. }
        | LifecycleError::TerminalState { .. }
        | LifecycleError::StaleState { .. }
        | LifecycleError::InvalidDisputeTransition { .. } => StatusCode::CONFLICT,
        LifecycleError::PreconditionNotMet(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
        LifecycleError::InvalidOrder(_) | LifecycleError::InvalidDispute(_) => StatusCode::BAD_REQUEST,
        LifecycleError::PersistenceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        LifecycleError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::info!(application_error = %self, "Request rejected");
    }
    let retryable = matches!(self, AppError::Lifecycle(e) if e.is_retryable());
    HttpResponse::build(status).json(json!({
      "error": self.code(),
      "message": self.message(),
      "retryable": retryable,
    }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use orderflow::{OrderStatus, StoreError};

  #[test]
  fn stale_state_is_a_retryable_conflict() {
    let err = AppError::from(LifecycleError::StaleState {
      expected: OrderStatus::Pending,
      actual: OrderStatus::Accepted,
    });
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
    assert_eq!(err.code(), "stale_state");
    assert_eq!(err.message(), "Someone already updated this order, refresh and try again.");
  }

  #[test]
  fn store_outage_is_service_unavailable() {
    let err = AppError::from(LifecycleError::from(StoreError::unavailable(anyhow::anyhow!("down"))));
    assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err.error_response().status(), StatusCode::SERVICE_UNAVAILABLE);
  }
}
