// demos/market_app/src/web/identity.rs

use crate::errors::AppError;
use actix_web::{FromRequest, HttpRequest};
use orderflow::{Actor, Role};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_ROLES_HEADER: &str = "X-User-Roles";

/// The caller as announced by the gateway in front of this service.
/// Authentication happens upstream; this only parses what it forwarded.
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

fn header<'a>(req: &'a HttpRequest, name: &str) -> Result<&'a str, AppError> {
  req
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .ok_or_else(|| AppError::Auth(format!("Missing or unreadable {} header.", name)))
}

fn parse_caller(req: &HttpRequest) -> Result<Caller, AppError> {
  let user_id = Uuid::parse_str(header(req, USER_ID_HEADER)?)
    .map_err(|e| AppError::Auth(format!("Invalid {} header: {}", USER_ID_HEADER, e)))?;
  let roles = header(req, USER_ROLES_HEADER)?
    .split(',')
    .map(str::trim)
    .filter(|r| !r.is_empty())
    .map(|r| Role::from_str(&r.to_ascii_lowercase()).map_err(AppError::Auth))
    .collect::<Result<BTreeSet<Role>, _>>()?;
  if roles.is_empty() {
    return Err(AppError::Auth(format!("{} lists no roles.", USER_ROLES_HEADER)));
  }
  Ok(Caller(Actor::new(user_id, roles)))
}

impl FromRequest for Caller {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let parsed = parse_caller(req);
    if let Err(e) = &parsed {
      warn!(error = %e, "Caller extractor rejected the request.");
    }
    futures_util::future::ready(parsed)
  }
}
