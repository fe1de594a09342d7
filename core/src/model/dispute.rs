// orderflow/src/model/dispute.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
  Open,
  UnderReview,
  Resolved,
  Closed,
}

impl DisputeStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      DisputeStatus::Open => "open",
      DisputeStatus::UnderReview => "under_review",
      DisputeStatus::Resolved => "resolved",
      DisputeStatus::Closed => "closed",
    }
  }

  /// Open disputes hold their order out of the normal flow.
  pub fn is_active(&self) -> bool {
    matches!(self, DisputeStatus::Open | DisputeStatus::UnderReview)
  }

  pub fn can_move_to(&self, to: DisputeStatus) -> bool {
    use DisputeStatus::*;
    matches!(
      (self, to),
      (Open, UnderReview) | (Open, Resolved) | (UnderReview, Resolved) | (Resolved, Closed)
    )
  }
}

impl fmt::Display for DisputeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DisputeStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "open" => Ok(DisputeStatus::Open),
      "under_review" => Ok(DisputeStatus::UnderReview),
      "resolved" => Ok(DisputeStatus::Resolved),
      "closed" => Ok(DisputeStatus::Closed),
      other => Err(format!("unknown dispute status '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
  pub id: Uuid,
  pub order_id: Uuid,
  pub reporter_id: Uuid,
  pub category: String,
  pub description: String,
  pub status: DisputeStatus,
  pub resolution: Option<String>,
  pub admin_notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Dispute {
  pub fn open(
    order_id: Uuid,
    reporter_id: Uuid,
    category: impl Into<String>,
    description: impl Into<String>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_id,
      reporter_id,
      category: category.into(),
      description: description.into(),
      status: DisputeStatus::Open,
      resolution: None,
      admin_notes: None,
      created_at: now,
      updated_at: now,
    }
  }
}
