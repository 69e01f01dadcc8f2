//! Elevated, never-persisted memberships for platform bypass.
//!
//! A synthetic membership stands in for a real one when a superuser or a
//! global grant opens an entity. It always carries the domain's highest role;
//! the platform role label is provenance only and never affects the decision.
use std::fmt;
use std::marker::PhantomData;
use warden_authz::{AccessDomain, EntityId, UserId};

/// Why the bypass applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BypassKind {
    Superuser,
    GlobalGrant,
}

impl BypassKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BypassKind::Superuser => "superuser",
            BypassKind::GlobalGrant => "global-grant",
        }
    }
}

impl fmt::Display for BypassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticMembership<R> {
    pub user_id: UserId,
    pub entity_id: EntityId,
    pub role: R,
    /// Codename of the platform role that opened the entity.
    pub global_role: String,
    pub bypass: BypassKind,
}

pub struct SyntheticMembershipFactory<D>(PhantomData<D>);

impl<D: AccessDomain> SyntheticMembershipFactory<D> {
    /// Build an elevated membership. Pure; touches no store.
    pub fn build_elevated(
        user_id: &UserId,
        entity_id: &EntityId,
        global_role: impl Into<String>,
        bypass: BypassKind,
    ) -> SyntheticMembership<D::Role> {
        SyntheticMembership {
            user_id: user_id.clone(),
            entity_id: entity_id.clone(),
            role: D::HIGHEST_ROLE,
            global_role: global_role.into(),
            bypass,
        }
    }
}
