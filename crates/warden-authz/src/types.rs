//! Strongly typed identifiers for authorization subjects and entities.
//!
//! # Purpose
//! Wraps opaque identifiers so user, entity, platform-role and membership ids
//! cannot be swapped by accident when they flow through resolvers.
//!
//! # How it fits
//! Every store query and guard decision is keyed by these types. User ids
//! come from upstream authentication and are assumed verified; entity ids name
//! clusters, applications, domains and resources.
//!
//! # Key invariants
//! - `Display` and `as_str` return the original value unchanged.
//! - Membership ids are UUIDs minted by the write path, never by the guard.
//!
//! # Examples
//! ```rust
//! use warden_authz::{EntityId, UserId};
//!
//! let user = UserId::new("u-1");
//! let cluster = EntityId::new("cluster-x");
//! assert_eq!(format!("{user}@{cluster}"), "u-1@cluster-x");
//! ```
//!
//! # Common pitfalls
//! - These wrappers do not validate their contents; validate at the API boundary.
use crate::AuthzError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
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

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Authenticated user identifier, opaque to the engine.
    UserId
);
string_id!(
    /// Identifier of a cluster, application, domain or resource.
    EntityId
);
string_id!(
    /// Identifier of a platform role that owns global grants.
    RoleId
);

/// Identifier of a persisted membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipId(Uuid);

impl MembershipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MembershipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MembershipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MembershipId {
    type Err = AuthzError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(input).map_err(|_| AuthzError::InvalidId(input.into()))?;
        Ok(Self(uuid))
    }
}

/// Kind of entity an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Cluster,
    Application,
    Domain,
    Resource,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Cluster => "cluster",
            EntityKind::Application => "application",
            EntityKind::Domain => "domain",
            EntityKind::Resource => "resource",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cluster" => Ok(EntityKind::Cluster),
            "application" => Ok(EntityKind::Application),
            "domain" => Ok(EntityKind::Domain),
            "resource" => Ok(EntityKind::Resource),
            other => Err(AuthzError::InvalidEntityKind(other.to_string())),
        }
    }
}

/// Typed pointer at one entity: the unit the guard authorizes against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn cluster(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Cluster, id)
    }

    pub fn application(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Application, id)
    }

    pub fn domain(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Domain, id)
    }

    pub fn resource(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Resource, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
