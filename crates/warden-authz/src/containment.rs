//! Containment edges between entities.
//!
//! # Purpose
//! Resources do not carry cluster memberships themselves; they are reached
//! through recorded parent/child edges. Each edge lives at a fixed level,
//! which also fixes the child and parent entity kinds.
//!
//! # Key invariants
//! - A resource may sit in zero, one or many domains; a domain in one or more
//!   clusters. Resolvers treat the reachable clusters as a de-duplicated set.
//! - `ResourceInCluster` is a denormalized shortcut consulted only when the
//!   domain path yields no clusters.
//!
//! # Examples
//! ```rust
//! use warden_authz::{ContainmentEdge, ContainmentLevel, EntityKind};
//!
//! let edge = ContainmentEdge::new(ContainmentLevel::ResourceInDomain, "r-1", "d-1");
//! assert_eq!(edge.child().kind, EntityKind::Resource);
//! assert_eq!(edge.parent().kind, EntityKind::Domain);
//! ```
use crate::{AuthzError, EntityId, EntityKind, EntityRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainmentLevel {
    ResourceInDomain,
    DomainInCluster,
    ResourceInCluster,
}

impl ContainmentLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainmentLevel::ResourceInDomain => "resource-in-domain",
            ContainmentLevel::DomainInCluster => "domain-in-cluster",
            ContainmentLevel::ResourceInCluster => "resource-in-cluster",
        }
    }

    pub fn child_kind(self) -> EntityKind {
        match self {
            ContainmentLevel::ResourceInDomain | ContainmentLevel::ResourceInCluster => {
                EntityKind::Resource
            }
            ContainmentLevel::DomainInCluster => EntityKind::Domain,
        }
    }

    pub fn parent_kind(self) -> EntityKind {
        match self {
            ContainmentLevel::ResourceInDomain => EntityKind::Domain,
            ContainmentLevel::DomainInCluster | ContainmentLevel::ResourceInCluster => {
                EntityKind::Cluster
            }
        }
    }
}

impl std::fmt::Display for ContainmentLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContainmentLevel {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "resource-in-domain" => Ok(ContainmentLevel::ResourceInDomain),
            "domain-in-cluster" => Ok(ContainmentLevel::DomainInCluster),
            "resource-in-cluster" => Ok(ContainmentLevel::ResourceInCluster),
            other => Err(AuthzError::InvalidContainmentLevel(other.to_string())),
        }
    }
}

/// Directed edge `child -> parent` at a given level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainmentEdge {
    pub level: ContainmentLevel,
    pub child_id: EntityId,
    pub parent_id: EntityId,
}

impl ContainmentEdge {
    pub fn new(
        level: ContainmentLevel,
        child_id: impl Into<EntityId>,
        parent_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            level,
            child_id: child_id.into(),
            parent_id: parent_id.into(),
        }
    }

    pub fn child(&self) -> EntityRef {
        EntityRef::new(self.level.child_kind(), self.child_id.clone())
    }

    pub fn parent(&self) -> EntityRef {
        EntityRef::new(self.level.parent_kind(), self.parent_id.clone())
    }
}
