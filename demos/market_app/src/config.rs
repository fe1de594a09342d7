// demos/market_app/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use orderflow::{FeePolicy, LifecycleConfig};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// Unset means the in-memory store.
  pub database_url: Option<String>,
  pub shopper_fee_bps: u32,
  pub stale_retry_limit: u32,
  pub notify_channel_capacity: usize,
}

fn parse_or<T>(var_name: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(var_name) {
    Ok(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
    Err(_) => Ok(default),
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = parse_or("SERVER_PORT", 8080u16)?;
    let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());

    let defaults = LifecycleConfig::default();
    let shopper_fee_bps = parse_or("SHOPPER_FEE_BPS", defaults.fees.shopper_fee_bps)?;
    if shopper_fee_bps > 10_000 {
      return Err(AppError::Config(format!(
        "SHOPPER_FEE_BPS must be at most 10000, got {}",
        shopper_fee_bps
      )));
    }
    let stale_retry_limit = parse_or("STALE_RETRY_LIMIT", defaults.stale_retry_limit)?;
    let notify_channel_capacity = parse_or("NOTIFY_CHANNEL_CAPACITY", 256usize)?;

    tracing::info!(
      server_host = %server_host,
      server_port,
      persistent = database_url.is_some(),
      shopper_fee_bps,
      "Application configuration loaded successfully."
    );

    Ok(Self {
      server_host,
      server_port,
      database_url,
      shopper_fee_bps,
      stale_retry_limit,
      notify_channel_capacity,
    })
  }

  pub fn lifecycle(&self) -> LifecycleConfig {
    LifecycleConfig {
      fees: FeePolicy::new(self.shopper_fee_bps),
      stale_retry_limit: self.stale_retry_limit,
    }
  }
}
