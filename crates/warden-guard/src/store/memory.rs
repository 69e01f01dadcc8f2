//! In-memory implementation of the authorization store.
//!
//! # Purpose
//! Implements every store trait with `HashMap`s guarded by
//! `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - embedding the engine where durability is not required
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: write locks for mutations, read locks for
//!   reads. A guard call sees whatever was committed before each of its reads.
//!
//! # Instrumentation
//! The store counts read queries and membership writes. Tests use the
//! counters to check that containment resolution stays bounded by graph depth
//! and that authorization never writes memberships.
use super::{
    AuthzStore, ContainmentStore, EntityStore, GrantStore, MembershipPatch, MembershipRecord,
    MembershipStore, NewMembership, StoreError, StoreResult,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use warden_authz::{
    ContainmentEdge, ContainmentLevel, EntityId, EntityKind, MembershipId, PermissionGrant,
    PlatformRole, RoleId, UserId,
};

/// Child id -> parent ids, per containment level.
type EdgeIndex = HashMap<ContainmentLevel, HashMap<EntityId, BTreeSet<EntityId>>>;

#[derive(Default)]
pub struct InMemoryStore {
    /// Membership rows keyed by id.
    memberships: Arc<RwLock<HashMap<MembershipId, MembershipRecord>>>,
    edges: Arc<RwLock<EdgeIndex>>,
    /// Platform roles keyed by id; ordered so superuser lookup is deterministic.
    roles: Arc<RwLock<BTreeMap<RoleId, PlatformRole>>>,
    grants: Arc<RwLock<Vec<PermissionGrant>>>,
    user_roles: Arc<RwLock<HashMap<UserId, BTreeSet<RoleId>>>>,
    entities: Arc<RwLock<HashSet<(EntityKind, EntityId)>>>,
    read_queries: AtomicU64,
    membership_writes: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read queries served so far.
    pub fn read_query_count(&self) -> u64 {
        self.read_queries.load(Ordering::Relaxed)
    }

    /// Number of membership inserts, updates and deletes applied so far.
    pub fn membership_write_count(&self) -> u64 {
        self.membership_writes.load(Ordering::Relaxed)
    }

    pub async fn membership_count(&self) -> usize {
        self.memberships.read().await.len()
    }

    fn count_read(&self) {
        self.read_queries.fetch_add(1, Ordering::Relaxed);
    }

    fn count_write(&self) {
        self.membership_writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn find_membership(
        &self,
        scope: &str,
        user_id: &UserId,
        entity_id: &EntityId,
    ) -> StoreResult<Option<MembershipRecord>> {
        self.count_read();
        Ok(self
            .memberships
            .read()
            .await
            .values()
            .find(|row| row.scope == scope && &row.user_id == user_id && &row.entity_id == entity_id)
            .cloned())
    }

    async fn find_memberships_in(
        &self,
        scope: &str,
        user_id: &UserId,
        entity_ids: &[EntityId],
    ) -> StoreResult<Vec<MembershipRecord>> {
        self.count_read();
        let wanted: HashSet<&EntityId> = entity_ids.iter().collect();
        let mut rows: Vec<MembershipRecord> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|row| {
                row.scope == scope && &row.user_id == user_id && wanted.contains(&row.entity_id)
            })
            .cloned()
            .collect();
        // Map iteration order is random; keep results stable for callers.
        rows.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        Ok(rows)
    }

    async fn find_membership_by_id(
        &self,
        scope: &str,
        id: &MembershipId,
    ) -> StoreResult<Option<MembershipRecord>> {
        self.count_read();
        Ok(self
            .memberships
            .read()
            .await
            .get(id)
            .filter(|row| row.scope == scope)
            .cloned())
    }

    async fn insert_membership(&self, membership: NewMembership) -> StoreResult<MembershipRecord> {
        let mut memberships = self.memberships.write().await;
        let duplicate = memberships.values().any(|row| {
            row.scope == membership.scope
                && row.user_id == membership.user_id
                && row.entity_id == membership.entity_id
        });
        if duplicate || memberships.contains_key(&membership.id) {
            return Err(StoreError::Conflict("membership exists".into()));
        }
        let record = membership.into_record();
        memberships.insert(record.id, record.clone());
        self.count_write();
        Ok(record)
    }

    async fn update_membership(
        &self,
        scope: &str,
        id: &MembershipId,
        patch: MembershipPatch,
    ) -> StoreResult<MembershipRecord> {
        let mut memberships = self.memberships.write().await;
        let row = memberships
            .get_mut(id)
            .filter(|row| row.scope == scope)
            .ok_or_else(|| StoreError::NotFound(format!("membership {id}")))?;
        if let Some(role) = patch.role {
            row.role = role;
        }
        if let Some(comment) = patch.comment {
            row.comment = comment;
        }
        let updated = row.clone();
        self.count_write();
        Ok(updated)
    }

    async fn delete_membership(&self, scope: &str, id: &MembershipId) -> StoreResult<()> {
        let mut memberships = self.memberships.write().await;
        match memberships.get(id) {
            Some(row) if row.scope == scope => {
                memberships.remove(id);
                self.count_write();
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!("membership {id}"))),
        }
    }
}

#[async_trait]
impl ContainmentStore for InMemoryStore {
    async fn parents_of(
        &self,
        level: ContainmentLevel,
        child_ids: &[EntityId],
    ) -> StoreResult<Vec<ContainmentEdge>> {
        self.count_read();
        let edges = self.edges.read().await;
        let Some(index) = edges.get(&level) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for child in child_ids {
            if let Some(parents) = index.get(child) {
                out.extend(
                    parents
                        .iter()
                        .map(|parent| ContainmentEdge::new(level, child.clone(), parent.clone())),
                );
            }
        }
        Ok(out)
    }

    async fn insert_edge(&self, edge: ContainmentEdge) -> StoreResult<()> {
        let inserted = self
            .edges
            .write()
            .await
            .entry(edge.level)
            .or_default()
            .entry(edge.child_id.clone())
            .or_default()
            .insert(edge.parent_id.clone());
        if !inserted {
            return Err(StoreError::Conflict(format!(
                "edge {} {} -> {} exists",
                edge.level, edge.child_id, edge.parent_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GrantStore for InMemoryStore {
    async fn roles_for_user(&self, user_id: &UserId) -> StoreResult<Vec<PlatformRole>> {
        self.count_read();
        let user_roles = self.user_roles.read().await;
        let Some(role_ids) = user_roles.get(user_id) else {
            return Ok(Vec::new());
        };
        let roles = self.roles.read().await;
        Ok(role_ids
            .iter()
            .filter_map(|id| roles.get(id).cloned())
            .collect())
    }

    async fn superuser_role_for_user(
        &self,
        user_id: &UserId,
    ) -> StoreResult<Option<PlatformRole>> {
        self.count_read();
        let user_roles = self.user_roles.read().await;
        let Some(role_ids) = user_roles.get(user_id) else {
            return Ok(None);
        };
        let roles = self.roles.read().await;
        Ok(role_ids
            .iter()
            .filter_map(|id| roles.get(id))
            .find(|role| role.superuser)
            .cloned())
    }

    async fn grants_for_roles(&self, role_ids: &[RoleId]) -> StoreResult<Vec<PermissionGrant>> {
        self.count_read();
        Ok(self
            .grants
            .read()
            .await
            .iter()
            .filter(|grant| role_ids.contains(&grant.role_id))
            .cloned()
            .collect())
    }

    async fn upsert_role(&self, role: PlatformRole) -> StoreResult<()> {
        self.roles.write().await.insert(role.id.clone(), role);
        Ok(())
    }

    async fn add_grant(&self, grant: PermissionGrant) -> StoreResult<()> {
        grant.validate()?;
        if !self.roles.read().await.contains_key(&grant.role_id) {
            return Err(StoreError::NotFound(format!("role {}", grant.role_id)));
        }
        let mut grants = self.grants.write().await;
        let duplicate = grants.iter().any(|existing| {
            existing.role_id == grant.role_id
                && existing.subject == grant.subject
                && existing.action == grant.action
        });
        if duplicate {
            return Err(StoreError::Conflict(format!("grant {grant} exists")));
        }
        grants.push(grant);
        Ok(())
    }

    async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> StoreResult<()> {
        if !self.roles.read().await.contains_key(role_id) {
            return Err(StoreError::NotFound(format!("role {role_id}")));
        }
        self.user_roles
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .insert(role_id.clone());
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn entity_exists(&self, kind: EntityKind, id: &EntityId) -> StoreResult<bool> {
        self.count_read();
        Ok(self
            .entities
            .read()
            .await
            .contains(&(kind, id.clone())))
    }

    async fn register_entity(&self, kind: EntityKind, id: &EntityId) -> StoreResult<()> {
        self.entities.write().await.insert((kind, id.clone()));
        Ok(())
    }
}

impl AuthzStore for InMemoryStore {
    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
