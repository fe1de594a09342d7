// orderflow/src/model/actor.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Consumer,
  Vendor,
  Shopper,
  Admin,
}

impl Role {
  pub const ALL: [Role; 4] = [Role::Consumer, Role::Vendor, Role::Shopper, Role::Admin];

  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Consumer => "consumer",
      Role::Vendor => "vendor",
      Role::Shopper => "shopper",
      Role::Admin => "admin",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "consumer" | "customer" => Ok(Role::Consumer),
      "vendor" => Ok(Role::Vendor),
      "shopper" => Ok(Role::Shopper),
      "admin" => Ok(Role::Admin),
      other => Err(format!("unknown role '{}'", other)),
    }
  }
}

/// The party asking for a change. Supplied by the caller on every call;
/// nothing in the core looks identity up on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id: Uuid,
  pub roles: BTreeSet<Role>,
}

impl Actor {
  pub fn new(user_id: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
    Self {
      user_id,
      roles: roles.into_iter().collect(),
    }
  }

  pub fn consumer(user_id: Uuid) -> Self {
    Self::new(user_id, [Role::Consumer])
  }

  pub fn vendor(user_id: Uuid) -> Self {
    Self::new(user_id, [Role::Vendor])
  }

  pub fn shopper(user_id: Uuid) -> Self {
    Self::new(user_id, [Role::Shopper])
  }

  pub fn admin(user_id: Uuid) -> Self {
    Self::new(user_id, [Role::Admin])
  }

  pub fn has_role(&self, role: Role) -> bool {
    self.roles.contains(&role)
  }

  pub fn is_admin(&self) -> bool {
    self.has_role(Role::Admin)
  }
}
