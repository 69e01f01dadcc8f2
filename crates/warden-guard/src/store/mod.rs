//! Backing-store contract for the authorization engine.
//!
//! # Purpose
//! The engine never talks to a database directly. It reads memberships,
//! containment edges, platform roles and grants through the traits below,
//! which are implemented by [`memory::InMemoryStore`] for tests and local use
//! and by [`postgres::PostgresStore`] for durable deployments.
//!
//! # Key invariants
//! - Read methods return `Option`/empty collections for absence; `NotFound`
//!   is reserved for write paths that target a missing row.
//! - Batched reads (`*_in`, `parents_of`) take whole id sets so containment
//!   resolution costs one round trip per graph level.
//! - Membership role tokens are stored as strings; parsing happens in the
//!   resolver so unknown tokens degrade to the lowest role.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_authz::{
    ContainmentEdge, ContainmentLevel, EntityId, EntityKind, MembershipId, PermissionGrant,
    PlatformRole, RoleId, UserId,
};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Conflict(db.message().to_string());
            }
            if db.is_foreign_key_violation() {
                return StoreError::NotFound(db.message().to_string());
            }
        }
        StoreError::Unexpected(err.into())
    }
}

impl From<warden_authz::AuthzError> for StoreError {
    fn from(err: warden_authz::AuthzError) -> Self {
        StoreError::Invalid(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted membership row; `role` is the raw stored token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: MembershipId,
    pub scope: String,
    pub user_id: UserId,
    pub entity_id: EntityId,
    pub role: String,
    pub granted_by: Option<UserId>,
    pub comment: Option<String>,
}

/// Insert payload for a membership. Callers mint the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMembership {
    pub id: MembershipId,
    pub scope: String,
    pub user_id: UserId,
    pub entity_id: EntityId,
    pub role: String,
    pub granted_by: Option<UserId>,
    pub comment: Option<String>,
}

impl NewMembership {
    pub fn into_record(self) -> MembershipRecord {
        MembershipRecord {
            id: self.id,
            scope: self.scope,
            user_id: self.user_id,
            entity_id: self.entity_id,
            role: self.role,
            granted_by: self.granted_by,
            comment: self.comment,
        }
    }
}

/// Partial update of a membership. `comment: Some(None)` clears the comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPatch {
    pub role: Option<String>,
    pub comment: Option<Option<String>>,
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_membership(
        &self,
        scope: &str,
        user_id: &UserId,
        entity_id: &EntityId,
    ) -> StoreResult<Option<MembershipRecord>>;
    /// One query for every entity in `entity_ids`.
    async fn find_memberships_in(
        &self,
        scope: &str,
        user_id: &UserId,
        entity_ids: &[EntityId],
    ) -> StoreResult<Vec<MembershipRecord>>;
    async fn find_membership_by_id(
        &self,
        scope: &str,
        id: &MembershipId,
    ) -> StoreResult<Option<MembershipRecord>>;
    async fn insert_membership(&self, membership: NewMembership) -> StoreResult<MembershipRecord>;
    async fn update_membership(
        &self,
        scope: &str,
        id: &MembershipId,
        patch: MembershipPatch,
    ) -> StoreResult<MembershipRecord>;
    async fn delete_membership(&self, scope: &str, id: &MembershipId) -> StoreResult<()>;
}

#[async_trait]
pub trait ContainmentStore: Send + Sync {
    /// Every edge at `level` whose child is one of `child_ids`.
    async fn parents_of(
        &self,
        level: ContainmentLevel,
        child_ids: &[EntityId],
    ) -> StoreResult<Vec<ContainmentEdge>>;
    async fn insert_edge(&self, edge: ContainmentEdge) -> StoreResult<()>;
}

#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn roles_for_user(&self, user_id: &UserId) -> StoreResult<Vec<PlatformRole>>;
    /// First superuser-flagged role held by the user, if any.
    async fn superuser_role_for_user(&self, user_id: &UserId)
    -> StoreResult<Option<PlatformRole>>;
    async fn grants_for_roles(&self, role_ids: &[RoleId]) -> StoreResult<Vec<PermissionGrant>>;
    async fn upsert_role(&self, role: PlatformRole) -> StoreResult<()>;
    /// Fails with [`StoreError::Conflict`] if `(role_id, subject, action)` exists.
    async fn add_grant(&self, grant: PermissionGrant) -> StoreResult<()>;
    async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> StoreResult<()>;
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn entity_exists(&self, kind: EntityKind, id: &EntityId) -> StoreResult<bool>;
    async fn register_entity(&self, kind: EntityKind, id: &EntityId) -> StoreResult<()>;
}

/// Everything the guard needs from one backend.
pub trait AuthzStore: MembershipStore + ContainmentStore + GrantStore + EntityStore {
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
