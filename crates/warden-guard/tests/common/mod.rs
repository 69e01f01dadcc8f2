#![allow(dead_code)]

use std::sync::Arc;
use warden_authz::{
    AccessDomain, ContainmentEdge, ContainmentLevel, EntityId, EntityKind, MembershipId,
    PermissionGrant, PlatformRole, RoleId, UserId,
};
use warden_guard::audit::{ChannelAuditSink, DenialEvent};
use warden_guard::global::PlatformSwitches;
use warden_guard::guard::AccessGuard;
use warden_guard::store::memory::InMemoryStore;
use warden_guard::store::{ContainmentStore, EntityStore, GrantStore, MembershipStore, NewMembership};

/// Seeds an in-memory store with entities, memberships, edges and grants.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
        }
    }

    pub async fn entity(&self, kind: EntityKind, id: &str) -> &Self {
        self.store
            .register_entity(kind, &EntityId::new(id))
            .await
            .expect("register entity");
        self
    }

    pub async fn member(&self, scope: &str, user: &str, entity: &str, role: &str) -> MembershipId {
        self.store
            .insert_membership(NewMembership {
                id: MembershipId::new(),
                scope: scope.to_string(),
                user_id: UserId::new(user),
                entity_id: EntityId::new(entity),
                role: role.to_string(),
                granted_by: None,
                comment: None,
            })
            .await
            .expect("insert membership")
            .id
    }

    pub async fn edge(&self, level: ContainmentLevel, child: &str, parent: &str) {
        self.store
            .insert_edge(ContainmentEdge::new(level, child, parent))
            .await
            .expect("insert edge");
    }

    /// Give `user` a platform role carrying `grants`.
    pub async fn platform_role(
        &self,
        user: &str,
        role: PlatformRole,
        grants: &[(&str, &str)],
    ) -> RoleId {
        let role_id = role.id.clone();
        self.store.upsert_role(role).await.expect("upsert role");
        for (subject, action) in grants {
            self.store
                .add_grant(PermissionGrant::new(role_id.clone(), *subject, *action))
                .await
                .expect("add grant");
        }
        self.store
            .assign_role(&UserId::new(user), &role_id)
            .await
            .expect("assign role");
        role_id
    }

    pub fn guard<D: AccessDomain>(&self, switches: PlatformSwitches) -> AccessGuard<D> {
        AccessGuard::new(self.store.clone(), switches)
    }

    /// A guard whose denials land on the returned receiver.
    pub fn audited_guard<D: AccessDomain>(
        &self,
        switches: PlatformSwitches,
    ) -> (AccessGuard<D>, tokio::sync::mpsc::Receiver<DenialEvent>) {
        let (sink, rx) = ChannelAuditSink::new(64);
        (self.guard(switches).with_audit_sink(Arc::new(sink)), rx)
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id)
}
