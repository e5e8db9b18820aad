// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Canonical types used across workhub.
//!
//! This module provides the role and identity definitions shared by the
//! session manager, the navigation policy and the store.

use serde::{Deserialize, Deserializer, Serialize};

/// Prefix the backend puts in front of every role name.
const ROLE_WIRE_PREFIX: &str = "ROLE_";

/// User role as issued by the backend.
///
/// Internal roles are ordered by seniority: `SuperAdmin > Admin > Employee`.
/// `Client` sits outside that hierarchy and inherits nothing from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_SUPER_ADMIN", alias = "SUPER_ADMIN")]
    SuperAdmin,
    #[serde(rename = "ROLE_ADMIN", alias = "ADMIN")]
    Admin,
    #[serde(rename = "ROLE_EMPLOYEE", alias = "EMPLOYEE")]
    Employee,
    #[serde(rename = "ROLE_CLIENT", alias = "CLIENT")]
    Client,
}

impl Role {
    /// Every known role, most senior first.
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Employee, Role::Client];

    /// Parse a role tag. Accepts both `ROLE_ADMIN` and `ADMIN`.
    ///
    /// Returns `None` for anything else; callers treat that exactly like a
    /// missing role.
    pub fn parse(raw: &str) -> Option<Self> {
        let tag = raw.strip_prefix(ROLE_WIRE_PREFIX).unwrap_or(raw);
        match tag {
            "SUPER_ADMIN" => Some(Role::SuperAdmin),
            "ADMIN" => Some(Role::Admin),
            "EMPLOYEE" => Some(Role::Employee),
            "CLIENT" => Some(Role::Client),
            _ => None,
        }
    }

    /// Wire representation, as the backend sends it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "ROLE_SUPER_ADMIN",
            Role::Admin => "ROLE_ADMIN",
            Role::Employee => "ROLE_EMPLOYEE",
            Role::Client => "ROLE_CLIENT",
        }
    }

    /// Seniority within the internal hierarchy. `None` for clients.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Role::SuperAdmin => Some(3),
            Role::Admin => Some(2),
            Role::Employee => Some(1),
            Role::Client => None,
        }
    }

    /// True if this role is an internal role at least as senior as `other`.
    ///
    /// Clients never satisfy this, and no role is "at least" a client except
    /// a client itself.
    pub fn at_least(&self, other: Role) -> bool {
        match (self.rank(), other.rank()) {
            (Some(mine), Some(required)) => mine >= required,
            (None, None) => true,
            _ => false,
        }
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Role::Client)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str().trim_start_matches(ROLE_WIRE_PREFIX))
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| crate::error::UnknownRole(s.to_string()))
    }
}

/// Cached user profile associated with a credential.
///
/// The role is kept as the raw string the backend sent so that a stored
/// identity survives a round trip even when the role is not one we know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Backends send `null` for unset profile fields.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            role: role.as_str().to_string(),
            avatar_url: None,
            created_at: None,
            phone_number: None,
        }
    }

    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// The parsed role, or `None` if the stored tag is not recognized.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}
