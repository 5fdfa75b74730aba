//! Principals: registered users and their roles.
//!
//! Authentication lives outside the signoff core; these records exist so
//! grants, workflow stages, and admin checks can name stable identities.

use crate::id::{RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A role users can hold. The `admin` role unlocks administration surfaces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// A registered user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
}

/// A role with every user currently holding it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUsers {
    pub role: Role,
    pub users: Vec<User>,
}
