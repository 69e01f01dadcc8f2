//! The access guard: one authorization decision per call.
//!
//! # Purpose
//! [`AccessGuard`] is the only component that turns resolver output into
//! denials. It tries the resolution steps in a fixed order and returns an
//! [`AccessContext`] describing which membership opened the entity.
//!
//! # Resolution order
//! 1. The target must exist, else [`DenialKind::NotFound`].
//! 2. Platform bypass: a superuser, or a global grant on
//!    `(<domain subject>, read)`, gets a synthetic membership with the
//!    domain's highest role. Superusers skip the permission table; a
//!    global-grant bypass is still checked against it.
//! 3. Direct membership, checked against the permission table.
//! 4. Entities reached through containment (resources) fold the memberships
//!    of every reachable cluster; anything else is [`DenialKind::NotMember`].
//!
//! # Key invariants
//! - Read-only. Synthetic memberships are never written.
//! - Every denial is recorded on the audit sink before it is returned, and a
//!   sink failure never changes the outcome.
//! - Store failures surface as [`AccessError::Store`], never as a denial.
//! - Member-change operations veto owner targets with
//!   [`DenialKind::OwnerProtected`] after the caller is authorized, whoever
//!   the caller is.
//!
//! # Example
//! ```rust
//! use std::sync::Arc;
//! use warden_authz::{ClusterDomain, ClusterPermission, EntityRef, UserId};
//! use warden_guard::global::PlatformSwitches;
//! use warden_guard::guard::{AccessGuard, DenialKind};
//! use warden_guard::store::memory::InMemoryStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(InMemoryStore::new());
//! let guard = AccessGuard::<ClusterDomain>::new(store, PlatformSwitches::default());
//! let err = guard
//!     .authorize(
//!         &UserId::new("u1"),
//!         &EntityRef::cluster("missing"),
//!         Some(ClusterPermission::EditContent),
//!     )
//!     .await
//!     .expect_err("unknown cluster");
//! assert_eq!(err.denial_kind(), Some(DenialKind::NotFound));
//! # }
//! ```
use crate::audit::{AuditSink, DenialEvent, TracingAuditSink};
use crate::config::EngineConfig;
use crate::containment::ContainmentGraphResolver;
use crate::global::{GlobalRoleResolver, PlatformSwitches};
use crate::membership::{Membership, MembershipResolver};
use crate::observability::{AUDIT_SINK_FAILURES_TOTAL, DECISIONS_TOTAL, DENIALS_TOTAL};
use crate::store::{AuthzStore, StoreError};
use crate::synthetic::{BypassKind, SyntheticMembership, SyntheticMembershipFactory};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use warden_authz::{
    ACTION_READ, AccessDomain, EntityId, EntityRef, MembershipId, UserId, Vocabulary,
};

/// Closed set of denial reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NotMember,
    InsufficientRole,
    OwnerProtected,
    NotFound,
}

impl DenialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DenialKind::NotMember => "not_member",
            DenialKind::InsufficientRole => "insufficient_role",
            DenialKind::OwnerProtected => "owner_protected",
            DenialKind::NotFound => "not_found",
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            DenialKind::NotFound => 404,
            DenialKind::NotMember | DenialKind::InsufficientRole | DenialKind::OwnerProtected => {
                403
            }
        }
    }
}

impl fmt::Display for DenialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("access denied: {kind}")]
    Denied {
        kind: DenialKind,
        /// The caller's resolved role, when one was found.
        role: Option<&'static str>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AccessError {
    pub fn denial_kind(&self) -> Option<DenialKind> {
        match self {
            AccessError::Denied { kind, .. } => Some(*kind),
            AccessError::Store(_) => None,
        }
    }

    /// Status a transport adapter should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            AccessError::Denied { kind, .. } => kind.http_status(),
            AccessError::Store(_) => 500,
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

/// Which membership opened the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveMembership<R> {
    /// A stored membership on the target itself.
    Direct(Membership<R>),
    /// A stored membership on a cluster containing the target resource.
    Inherited(Membership<R>),
    /// An elevated membership built for platform bypass.
    Synthetic(SyntheticMembership<R>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    Direct,
    Inherited,
    Superuser,
    GlobalGrant,
}

impl AccessType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessType::Direct => "direct",
            AccessType::Inherited => "inherited",
            AccessType::Superuser => "superuser",
            AccessType::GlobalGrant => "global-grant",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful authorization outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext<R> {
    pub entity_id: EntityId,
    pub role: R,
    pub membership: EffectiveMembership<R>,
}

impl<R> AccessContext<R> {
    pub fn is_synthetic(&self) -> bool {
        matches!(self.membership, EffectiveMembership::Synthetic(_))
    }

    /// Platform role codename behind a synthetic membership.
    pub fn global_role(&self) -> Option<&str> {
        match &self.membership {
            EffectiveMembership::Synthetic(synthetic) => Some(&synthetic.global_role),
            _ => None,
        }
    }

    pub fn access_type(&self) -> AccessType {
        match &self.membership {
            EffectiveMembership::Direct(_) => AccessType::Direct,
            EffectiveMembership::Inherited(_) => AccessType::Inherited,
            EffectiveMembership::Synthetic(synthetic) => match synthetic.bypass {
                BypassKind::Superuser => AccessType::Superuser,
                BypassKind::GlobalGrant => AccessType::GlobalGrant,
            },
        }
    }

    /// Whether the caller should appear in member counts. Elevated platform
    /// access is not membership.
    pub fn counts_as_member(&self) -> bool {
        !self.is_synthetic()
    }

    /// The stored membership behind this context, if any.
    pub fn stored_membership(&self) -> Option<&Membership<R>> {
        match &self.membership {
            EffectiveMembership::Direct(membership) | EffectiveMembership::Inherited(membership) => {
                Some(membership)
            }
            EffectiveMembership::Synthetic(_) => None,
        }
    }
}

/// Authorization engine for one access domain.
pub struct AccessGuard<D: AccessDomain> {
    store: Arc<dyn AuthzStore>,
    global: GlobalRoleResolver,
    memberships: MembershipResolver<D>,
    containment: ContainmentGraphResolver<D>,
    audit: Arc<dyn AuditSink>,
}

impl<D: AccessDomain> AccessGuard<D> {
    pub fn new(store: Arc<dyn AuthzStore>, switches: PlatformSwitches) -> Self {
        Self {
            global: GlobalRoleResolver::new(store.clone(), switches),
            memberships: MembershipResolver::new(store.clone()),
            containment: ContainmentGraphResolver::new(store.clone()),
            audit: Arc::new(TracingAuditSink),
            store,
        }
    }

    pub fn from_config(store: Arc<dyn AuthzStore>, config: &EngineConfig) -> Self {
        Self::new(store, config.switches())
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn global(&self) -> &GlobalRoleResolver {
        &self.global
    }

    pub fn memberships(&self) -> &MembershipResolver<D> {
        &self.memberships
    }

    /// Decide whether `user_id` may act on `target`, optionally requiring
    /// `permission`.
    ///
    /// # Errors
    /// - [`AccessError::Denied`] with the reason for the denial.
    /// - [`AccessError::Store`] when the backing store fails.
    pub async fn authorize(
        &self,
        user_id: &UserId,
        target: &EntityRef,
        permission: Option<D::Permission>,
    ) -> AccessResult<AccessContext<D::Role>> {
        let action = permission.map(Vocabulary::as_str).unwrap_or("access");
        let outcome = self.resolve(user_id, target, permission).await;
        match outcome {
            Ok(Ok(context)) => {
                metrics::counter!(DECISIONS_TOTAL, "domain" => D::NAME, "outcome" => "allowed")
                    .increment(1);
                tracing::debug!(
                    domain = D::NAME,
                    user_id = %user_id,
                    entity = %target,
                    action,
                    role = %context.role,
                    access_type = %context.access_type(),
                    "authorization granted"
                );
                Ok(context)
            }
            Ok(Err((kind, role))) => Err(self.deny(user_id, &target.id, action, kind, role)),
            Err(err) => {
                tracing::warn!(
                    domain = D::NAME,
                    user_id = %user_id,
                    entity = %target,
                    error = %err,
                    "authorization store failure"
                );
                Err(AccessError::Store(err))
            }
        }
    }

    /// Authorize a change to the membership `target` on `entity`.
    ///
    /// The caller needs the domain's member-management permission, the target
    /// must belong to `entity`, and an owner target is always refused.
    pub async fn authorize_member_change(
        &self,
        user_id: &UserId,
        entity: &EntityRef,
        target: &MembershipId,
    ) -> AccessResult<(AccessContext<D::Role>, Membership<D::Role>)> {
        let action = D::MANAGE_MEMBERS.as_str();
        let context = self
            .authorize(user_id, entity, Some(D::MANAGE_MEMBERS))
            .await?;
        let membership = match self.memberships.find_by_id(target).await? {
            Some(membership) if membership.entity_id == entity.id => membership,
            _ => {
                return Err(self.deny(
                    user_id,
                    &entity.id,
                    action,
                    DenialKind::NotFound,
                    Some(context.role),
                ));
            }
        };
        if membership.role == D::OWNER_ROLE {
            return Err(self.deny(
                user_id,
                &entity.id,
                action,
                DenialKind::OwnerProtected,
                Some(context.role),
            ));
        }
        Ok((context, membership))
    }

    /// Run the resolution steps. The inner `Err` is a denial still to be
    /// reported; the outer one is a store failure.
    async fn resolve(
        &self,
        user_id: &UserId,
        target: &EntityRef,
        permission: Option<D::Permission>,
    ) -> Result<Result<AccessContext<D::Role>, (DenialKind, Option<D::Role>)>, StoreError> {
        let contained = D::resolves_through_containment(target.kind);
        if target.kind != D::ENTITY_KIND && !contained {
            return Ok(Err((DenialKind::NotFound, None)));
        }
        if !self.store.entity_exists(target.kind, &target.id).await? {
            return Ok(Err((DenialKind::NotFound, None)));
        }

        if let Some(context) = self.platform_bypass(user_id, &target.id).await? {
            if context.access_type() == AccessType::Superuser {
                return Ok(Ok(context));
            }
            return Ok(check_permission::<D>(context, permission));
        }

        if let Some(membership) = self.memberships.find(user_id, &target.id).await? {
            let context = AccessContext {
                entity_id: target.id.clone(),
                role: membership.role,
                membership: EffectiveMembership::Direct(membership),
            };
            return Ok(check_permission::<D>(context, permission));
        }

        if !contained {
            return Ok(Err((DenialKind::NotMember, None)));
        }

        let resolution = self
            .containment
            .resolve_ancestors(user_id, &target.id)
            .await?;
        if resolution.is_unreachable() {
            return Ok(Err((DenialKind::NotFound, None)));
        }
        let mut memberships = resolution.memberships;
        if memberships.is_empty() {
            return Ok(Err((DenialKind::NotMember, None)));
        }
        memberships.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        let table = D::permission_table();
        let strongest = pick_most_permissive::<D>(memberships.iter());
        let qualifying = memberships
            .iter()
            .filter(|m| permission.is_none_or(|p| table.lookup(m.role, p)));
        let Some(chosen) = pick_most_permissive::<D>(qualifying) else {
            return Ok(Err((
                DenialKind::InsufficientRole,
                strongest.map(|membership| membership.role),
            )));
        };
        let chosen = chosen.clone();
        Ok(Ok(AccessContext {
            entity_id: target.id.clone(),
            role: chosen.role,
            membership: EffectiveMembership::Inherited(chosen),
        }))
    }

    async fn platform_bypass(
        &self,
        user_id: &UserId,
        entity_id: &EntityId,
    ) -> Result<Option<AccessContext<D::Role>>, StoreError> {
        let elevated = if let Some(role) = self.global.superuser_role(user_id).await? {
            Some((role.codename, BypassKind::Superuser))
        } else {
            self.global
                .matching_grant(user_id, D::SUBJECT, ACTION_READ)
                .await?
                .map(|(role, _)| (role.codename, BypassKind::GlobalGrant))
        };
        Ok(elevated.map(|(label, bypass)| {
            let synthetic = SyntheticMembershipFactory::<D>::build_elevated(
                user_id, entity_id, label, bypass,
            );
            AccessContext {
                entity_id: entity_id.clone(),
                role: synthetic.role,
                membership: EffectiveMembership::Synthetic(synthetic),
            }
        }))
    }

    /// Record a denial and build the error to return.
    pub(crate) fn deny(
        &self,
        user_id: &UserId,
        entity_id: &EntityId,
        action: &str,
        kind: DenialKind,
        role: Option<D::Role>,
    ) -> AccessError {
        metrics::counter!(DECISIONS_TOTAL, "domain" => D::NAME, "outcome" => "denied")
            .increment(1);
        metrics::counter!(DENIALS_TOTAL, "domain" => D::NAME, "reason" => kind.as_str())
            .increment(1);
        let event = DenialEvent {
            timestamp: chrono::Utc::now(),
            domain: D::NAME,
            user_id: user_id.clone(),
            entity_id: entity_id.clone(),
            action: action.to_string(),
            reason: kind,
            role: role.map(|role| role.as_str().to_string()),
        };
        if let Err(err) = self.audit.record(&event) {
            metrics::counter!(AUDIT_SINK_FAILURES_TOTAL).increment(1);
            tracing::warn!(
                domain = D::NAME,
                user_id = %user_id,
                entity_id = %entity_id,
                reason = %kind,
                error = %err,
                "audit sink failed; denial not recorded"
            );
        }
        AccessError::Denied {
            kind,
            role: role.map(Vocabulary::as_str),
        }
    }
}

fn check_permission<D: AccessDomain>(
    context: AccessContext<D::Role>,
    permission: Option<D::Permission>,
) -> Result<AccessContext<D::Role>, (DenialKind, Option<D::Role>)> {
    match permission {
        Some(permission) if !D::permission_table().lookup(context.role, permission) => {
            Err((DenialKind::InsufficientRole, Some(context.role)))
        }
        _ => Ok(context),
    }
}

/// Most permissive membership; ties keep the earliest, i.e. the smallest
/// entity id when the input is sorted.
fn pick_most_permissive<'a, D: AccessDomain>(
    memberships: impl Iterator<Item = &'a Membership<D::Role>>,
) -> Option<&'a Membership<D::Role>> {
    let table = D::permission_table();
    memberships.reduce(|best, next| {
        if table.compare_permissiveness(next.role, best.role) == Ordering::Greater {
            next
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditError, ChannelAuditSink};
    use crate::store::memory::InMemoryStore;
    use crate::store::{EntityStore, MembershipStore, NewMembership};
    use warden_authz::{
        ApplicationDomain, ApplicationPermission, ClusterDomain, ClusterPermission, ClusterRole,
        EntityKind,
    };

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _event: &DenialEvent) -> Result<(), AuditError> {
            Err(AuditError::Sink("disk full".to_string()))
        }
    }

    async fn store_with_cluster(id: &str) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .register_entity(EntityKind::Cluster, &EntityId::new(id))
            .await
            .expect("register");
        store
    }

    async fn member(store: &InMemoryStore, user: &str, cluster: &str, role: &str) -> MembershipId {
        store
            .insert_membership(NewMembership {
                id: MembershipId::new(),
                scope: "clusters".to_string(),
                user_id: UserId::new(user),
                entity_id: EntityId::new(cluster),
                role: role.to_string(),
                granted_by: None,
                comment: None,
            })
            .await
            .expect("member")
            .id
    }

    #[test]
    fn denial_kinds_map_to_statuses() {
        assert_eq!(DenialKind::NotMember.http_status(), 403);
        assert_eq!(DenialKind::InsufficientRole.http_status(), 403);
        assert_eq!(DenialKind::OwnerProtected.http_status(), 403);
        assert_eq!(DenialKind::NotFound.http_status(), 404);
        let store_err = AccessError::Store(StoreError::Conflict("x".to_string()));
        assert_eq!(store_err.denial_kind(), None);
        assert_eq!(store_err.http_status(), 500);
    }

    #[tokio::test]
    async fn direct_membership_checks_permission_table() {
        let store = store_with_cluster("c1").await;
        member(&store, "u1", "c1", "editor").await;
        let guard = AccessGuard::<ClusterDomain>::new(store, PlatformSwitches::default());
        let user = UserId::new("u1");
        let cluster = EntityRef::cluster("c1");

        let context = guard
            .authorize(&user, &cluster, Some(ClusterPermission::EditContent))
            .await
            .expect("editor edits");
        assert_eq!(context.role, ClusterRole::Editor);
        assert_eq!(context.access_type(), AccessType::Direct);
        assert!(context.counts_as_member());

        let err = guard
            .authorize(&user, &cluster, Some(ClusterPermission::ManageMembers))
            .await
            .expect_err("editor cannot manage members");
        assert!(matches!(
            err,
            AccessError::Denied {
                kind: DenialKind::InsufficientRole,
                role: Some("editor"),
            }
        ));
    }

    #[tokio::test]
    async fn missing_entity_is_not_found_and_unknown_user_is_not_member() {
        let store = store_with_cluster("c1").await;
        let guard = AccessGuard::<ClusterDomain>::new(store, PlatformSwitches::default());
        let user = UserId::new("u1");

        let err = guard
            .authorize(&user, &EntityRef::cluster("nope"), None)
            .await
            .expect_err("missing");
        assert_eq!(err.denial_kind(), Some(DenialKind::NotFound));

        let err = guard
            .authorize(&user, &EntityRef::cluster("c1"), None)
            .await
            .expect_err("stranger");
        assert_eq!(err.denial_kind(), Some(DenialKind::NotMember));
    }

    #[tokio::test]
    async fn foreign_entity_kind_is_not_found() {
        let store = store_with_cluster("c1").await;
        let guard = AccessGuard::<ApplicationDomain>::new(store, PlatformSwitches::all_enabled());
        let err = guard
            .authorize(
                &UserId::new("u1"),
                &EntityRef::cluster("c1"),
                Some(ApplicationPermission::ViewLogs),
            )
            .await
            .expect_err("clusters are not applications");
        assert_eq!(err.denial_kind(), Some(DenialKind::NotFound));
    }

    #[tokio::test]
    async fn denials_reach_the_audit_sink() {
        let store = store_with_cluster("c1").await;
        member(&store, "u1", "c1", "member").await;
        let (sink, mut rx) = ChannelAuditSink::new(8);
        let guard = AccessGuard::<ClusterDomain>::new(store, PlatformSwitches::default())
            .with_audit_sink(Arc::new(sink));

        let _ = guard
            .authorize(
                &UserId::new("u1"),
                &EntityRef::cluster("c1"),
                Some(ClusterPermission::DeleteContent),
            )
            .await
            .expect_err("member cannot delete");
        let event = rx.try_recv().expect("event recorded");
        assert_eq!(event.reason, DenialKind::InsufficientRole);
        assert_eq!(event.action, "deleteContent");
        assert_eq!(event.role.as_deref(), Some("member"));
        assert_eq!(event.entity_id, EntityId::new("c1"));
    }

    #[tokio::test]
    async fn failing_sink_does_not_change_the_outcome() {
        let store = store_with_cluster("c1").await;
        member(&store, "u1", "c1", "owner").await;
        let guard = AccessGuard::<ClusterDomain>::new(store, PlatformSwitches::default())
            .with_audit_sink(Arc::new(FailingSink));

        let err = guard
            .authorize(&UserId::new("u2"), &EntityRef::cluster("c1"), None)
            .await
            .expect_err("stranger");
        assert_eq!(err.denial_kind(), Some(DenialKind::NotMember));

        let context = guard
            .authorize(
                &UserId::new("u1"),
                &EntityRef::cluster("c1"),
                Some(ClusterPermission::ManageCluster),
            )
            .await
            .expect("owner allowed");
        assert_eq!(context.role, ClusterRole::Owner);
    }

    #[tokio::test]
    async fn member_change_target_must_belong_to_entity() {
        let store = store_with_cluster("c1").await;
        store
            .register_entity(EntityKind::Cluster, &EntityId::new("c2"))
            .await
            .expect("register");
        member(&store, "admin", "c1", "admin").await;
        let elsewhere = member(&store, "u2", "c2", "member").await;
        let guard = AccessGuard::<ClusterDomain>::new(store, PlatformSwitches::default());

        let err = guard
            .authorize_member_change(&UserId::new("admin"), &EntityRef::cluster("c1"), &elsewhere)
            .await
            .expect_err("foreign membership");
        assert_eq!(err.denial_kind(), Some(DenialKind::NotFound));

        let err = guard
            .authorize_member_change(
                &UserId::new("admin"),
                &EntityRef::cluster("c1"),
                &MembershipId::new(),
            )
            .await
            .expect_err("missing membership");
        assert_eq!(err.denial_kind(), Some(DenialKind::NotFound));
    }

    #[test]
    fn ties_keep_the_smallest_entity_id() {
        let membership = |entity: &str, role| Membership {
            id: MembershipId::new(),
            user_id: UserId::new("u1"),
            entity_id: EntityId::new(entity),
            role,
            granted_by: None,
            comment: None,
        };
        let memberships = [
            membership("c1", ClusterRole::Editor),
            membership("c2", ClusterRole::Admin),
            membership("c3", ClusterRole::Admin),
        ];
        let chosen = pick_most_permissive::<ClusterDomain>(memberships.iter()).expect("chosen");
        assert_eq!(chosen.entity_id, EntityId::new("c2"));
    }
}
