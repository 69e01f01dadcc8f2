//! Membership management behind the access guard.
//!
//! # Purpose
//! Adds, changes and removes memberships on behalf of an acting user. Every
//! write is authorized first: the actor needs the domain's member-management
//! permission, and owner memberships can be neither created, modified nor
//! removed through this path.
//!
//! # Key invariants
//! - Ownership is established only when an entity is created, via
//!   [`MembershipManager::create_owner_membership`].
//! - Granting or promoting to the owner role is refused with
//!   [`DenialKind::OwnerProtected`], like any change to an owner target.
//! - Memberships attach only to the domain's own entity kind. Resources
//!   inherit access through containment and never carry memberships.
//! - Store conflicts (the user is already a member) surface as
//!   [`AccessError::Store`].
use crate::guard::{AccessError, AccessGuard, AccessResult, DenialKind};
use crate::membership::Membership;
use crate::store::{AuthzStore, MembershipPatch, NewMembership, StoreError, StoreResult};
use std::sync::Arc;
use warden_authz::{AccessDomain, EntityRef, MembershipId, UserId, Vocabulary};

/// Requested change to an existing membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberUpdate<R> {
    pub role: Option<R>,
    /// `Some(None)` clears the comment.
    pub comment: Option<Option<String>>,
}

impl<R> Default for MemberUpdate<R> {
    fn default() -> Self {
        Self {
            role: None,
            comment: None,
        }
    }
}

pub struct MembershipManager<D: AccessDomain> {
    store: Arc<dyn AuthzStore>,
    guard: Arc<AccessGuard<D>>,
}

impl<D: AccessDomain> MembershipManager<D> {
    pub fn new(store: Arc<dyn AuthzStore>, guard: Arc<AccessGuard<D>>) -> Self {
        Self { store, guard }
    }

    /// Register a new top-level entity and make `owner` its owner.
    ///
    /// # Errors
    /// - [`StoreError::Invalid`] if `entity` is not this domain's entity kind.
    /// - [`StoreError::Conflict`] if `owner` is already a member.
    pub async fn create_owner_membership(
        &self,
        owner: &UserId,
        entity: &EntityRef,
    ) -> StoreResult<Membership<D::Role>> {
        ensure_member_scope::<D>(entity)?;
        self.store.register_entity(entity.kind, &entity.id).await?;
        let record = self
            .store
            .insert_membership(NewMembership {
                id: MembershipId::new(),
                scope: D::NAME.to_string(),
                user_id: owner.clone(),
                entity_id: entity.id.clone(),
                role: D::OWNER_ROLE.as_str().to_string(),
                granted_by: None,
                comment: None,
            })
            .await?;
        tracing::info!(
            domain = D::NAME,
            entity = %entity,
            owner = %owner,
            "owner membership created"
        );
        Ok(Membership::from_record::<D>(record))
    }

    pub async fn add_member(
        &self,
        actor: &UserId,
        entity: &EntityRef,
        user_id: &UserId,
        role: D::Role,
        comment: Option<String>,
    ) -> AccessResult<Membership<D::Role>> {
        ensure_member_scope::<D>(entity)?;
        let context = self
            .guard
            .authorize(actor, entity, Some(D::MANAGE_MEMBERS))
            .await?;
        if role == D::OWNER_ROLE {
            return Err(self.guard.deny(
                actor,
                &entity.id,
                D::MANAGE_MEMBERS.as_str(),
                DenialKind::OwnerProtected,
                Some(context.role),
            ));
        }
        let record = self
            .store
            .insert_membership(NewMembership {
                id: MembershipId::new(),
                scope: D::NAME.to_string(),
                user_id: user_id.clone(),
                entity_id: entity.id.clone(),
                role: role.as_str().to_string(),
                granted_by: Some(actor.clone()),
                comment,
            })
            .await?;
        tracing::info!(
            domain = D::NAME,
            entity = %entity,
            actor = %actor,
            user_id = %user_id,
            role = %role,
            access_type = %context.access_type(),
            "member added"
        );
        Ok(Membership::from_record::<D>(record))
    }

    pub async fn update_member(
        &self,
        actor: &UserId,
        entity: &EntityRef,
        membership_id: &MembershipId,
        update: MemberUpdate<D::Role>,
    ) -> AccessResult<Membership<D::Role>> {
        let (context, _target) = self
            .guard
            .authorize_member_change(actor, entity, membership_id)
            .await?;
        if update.role == Some(D::OWNER_ROLE) {
            return Err(self.guard.deny(
                actor,
                &entity.id,
                D::MANAGE_MEMBERS.as_str(),
                DenialKind::OwnerProtected,
                Some(context.role),
            ));
        }
        let record = self
            .store
            .update_membership(
                D::NAME,
                membership_id,
                MembershipPatch {
                    role: update.role.map(|role| role.as_str().to_string()),
                    comment: update.comment,
                },
            )
            .await
            .map_err(AccessError::Store)?;
        tracing::info!(
            domain = D::NAME,
            entity = %entity,
            actor = %actor,
            membership_id = %membership_id,
            role = %record.role,
            "member updated"
        );
        Ok(Membership::from_record::<D>(record))
    }

    pub async fn remove_member(
        &self,
        actor: &UserId,
        entity: &EntityRef,
        membership_id: &MembershipId,
    ) -> AccessResult<Membership<D::Role>> {
        let (_context, target) = self
            .guard
            .authorize_member_change(actor, entity, membership_id)
            .await?;
        self.store.delete_membership(D::NAME, membership_id).await?;
        tracing::info!(
            domain = D::NAME,
            entity = %entity,
            actor = %actor,
            user_id = %target.user_id,
            "member removed"
        );
        Ok(target)
    }
}

fn ensure_member_scope<D: AccessDomain>(entity: &EntityRef) -> StoreResult<()> {
    if entity.kind != D::ENTITY_KIND {
        return Err(StoreError::Invalid(format!(
            "{} memberships cannot be attached to {}",
            D::NAME,
            entity
        )));
    }
    Ok(())
}
