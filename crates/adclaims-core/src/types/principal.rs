//! Principal and role claim types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A role identifier attached to a principal.
///
/// Holds either a bare group common name (flat resolution) or a group's
/// full distinguished name (nested resolution).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleClaim(String);

impl RoleClaim {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RoleClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleClaim {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Accumulates role claims on an identity.
///
/// Duplicates are accepted; deduplication is the resolver's concern.
pub trait RoleSink {
    fn add_role(&mut self, role: &RoleClaim);

    fn add_roles(&mut self, roles: &[RoleClaim]) {
        for role in roles {
            self.add_role(role);
        }
    }
}

/// Authenticated identity handed over by the authentication pipeline.
///
/// Only the role set is mutable; the name is fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    name: String,
    role_claim_type: String,
    roles: Vec<RoleClaim>,
    authenticated_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role_claim_type: crate::ROLE_CLAIM_TYPE.to_string(),
            roles: Vec::new(),
            authenticated_at: Utc::now(),
        }
    }

    pub fn with_role_claim_type(mut self, claim_type: impl Into<String>) -> Self {
        self.role_claim_type = claim_type.into();
        self
    }

    /// Name in `user@domain` form
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role_claim_type(&self) -> &str {
        &self.role_claim_type
    }

    pub fn roles(&self) -> &[RoleClaim] {
        &self.roles
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }
}

impl RoleSink for Principal {
    fn add_role(&mut self, role: &RoleClaim) {
        self.roles.push(role.clone());
    }
}
