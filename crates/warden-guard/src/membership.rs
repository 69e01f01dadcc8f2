//! Direct membership lookup for one access domain.
//!
//! # Key invariants
//! - Lookups never fabricate a membership; absence is `None`, not an error.
//! - Stored role tokens are parsed with [`AccessDomain::resolve_role`], so an
//!   unknown token degrades to the domain's lowest role.
//! - [`MembershipResolver::find_in`] is a single store query regardless of
//!   how many entity ids it is given.
use crate::store::{AuthzStore, MembershipRecord, StoreResult};
use std::marker::PhantomData;
use std::sync::Arc;
use warden_authz::{AccessDomain, EntityId, MembershipId, UserId};

/// A stored membership with its role parsed into the domain vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership<R> {
    pub id: MembershipId,
    pub user_id: UserId,
    pub entity_id: EntityId,
    pub role: R,
    pub granted_by: Option<UserId>,
    pub comment: Option<String>,
}

impl<R> Membership<R> {
    pub fn from_record<D>(record: MembershipRecord) -> Self
    where
        D: AccessDomain<Role = R>,
    {
        Self {
            role: D::resolve_role(Some(record.role.as_str())),
            id: record.id,
            user_id: record.user_id,
            entity_id: record.entity_id,
            granted_by: record.granted_by,
            comment: record.comment,
        }
    }
}

pub struct MembershipResolver<D: AccessDomain> {
    store: Arc<dyn AuthzStore>,
    _domain: PhantomData<D>,
}

impl<D: AccessDomain> Clone for MembershipResolver<D> {
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<D: AccessDomain> MembershipResolver<D> {
    pub fn new(store: Arc<dyn AuthzStore>) -> Self {
        Self {
            store,
            _domain: PhantomData,
        }
    }

    pub async fn find(
        &self,
        user_id: &UserId,
        entity_id: &EntityId,
    ) -> StoreResult<Option<Membership<D::Role>>> {
        let record = self
            .store
            .find_membership(D::NAME, user_id, entity_id)
            .await?;
        Ok(record.map(Membership::from_record::<D>))
    }

    pub async fn find_in(
        &self,
        user_id: &UserId,
        entity_ids: &[EntityId],
    ) -> StoreResult<Vec<Membership<D::Role>>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = self
            .store
            .find_memberships_in(D::NAME, user_id, entity_ids)
            .await?;
        Ok(records
            .into_iter()
            .map(Membership::from_record::<D>)
            .collect())
    }

    pub async fn find_by_id(&self, id: &MembershipId) -> StoreResult<Option<Membership<D::Role>>> {
        let record = self.store.find_membership_by_id(D::NAME, id).await?;
        Ok(record.map(Membership::from_record::<D>))
    }
}
