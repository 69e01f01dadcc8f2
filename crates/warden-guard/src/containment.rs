//! Walks resource containment up to the clusters that carry memberships.
//!
//! # Purpose
//! Resources have no memberships of their own. Access is inherited from the
//! clusters that contain them, reached either through domains
//! (`resource -> domain -> cluster`) or through the direct
//! `resource -> cluster` shortcut.
//!
//! # Key invariants
//! - One batched store query per graph level, never one per edge:
//!   domains, clusters, the shortcut (only when no cluster was found), then
//!   memberships. At most four queries per call.
//! - Ancestor sets are flat and de-duplicated, so a cluster reached through
//!   several domains is evaluated once.
//! - The resolver never denies. An empty ancestor set or an empty membership
//!   list is returned as-is and mapped to a denial by the guard.
use crate::membership::{Membership, MembershipResolver};
use crate::store::{AuthzStore, StoreResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use warden_authz::{AccessDomain, ContainmentEdge, ContainmentLevel, EntityId, UserId};

/// Outcome of a containment walk for one user and resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorResolution<R> {
    /// Domains the resource belongs to.
    pub domains: BTreeSet<EntityId>,
    /// Clusters reached, through domains or the shortcut.
    pub ancestors: BTreeSet<EntityId>,
    /// The user's memberships on `ancestors`.
    pub memberships: Vec<Membership<R>>,
}

impl<R> AncestorResolution<R> {
    fn empty(domains: BTreeSet<EntityId>) -> Self {
        Self {
            domains,
            ancestors: BTreeSet::new(),
            memberships: Vec::new(),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.ancestors.is_empty()
    }
}

pub struct ContainmentGraphResolver<D: AccessDomain> {
    store: Arc<dyn AuthzStore>,
    memberships: MembershipResolver<D>,
}

impl<D: AccessDomain> ContainmentGraphResolver<D> {
    pub fn new(store: Arc<dyn AuthzStore>) -> Self {
        Self {
            memberships: MembershipResolver::new(store.clone()),
            store,
        }
    }

    pub async fn resolve_ancestors(
        &self,
        user_id: &UserId,
        resource_id: &EntityId,
    ) -> StoreResult<AncestorResolution<D::Role>> {
        let resource = std::slice::from_ref(resource_id);
        let domains = parent_set(
            self.store
                .parents_of(ContainmentLevel::ResourceInDomain, resource)
                .await?,
        );

        let mut ancestors = if domains.is_empty() {
            BTreeSet::new()
        } else {
            let domain_ids: Vec<EntityId> = domains.iter().cloned().collect();
            parent_set(
                self.store
                    .parents_of(ContainmentLevel::DomainInCluster, &domain_ids)
                    .await?,
            )
        };

        if ancestors.is_empty() {
            ancestors = parent_set(
                self.store
                    .parents_of(ContainmentLevel::ResourceInCluster, resource)
                    .await?,
            );
        }

        if ancestors.is_empty() {
            tracing::debug!(
                domain = D::NAME,
                resource_id = %resource_id,
                "resource has no reachable ancestors"
            );
            return Ok(AncestorResolution::empty(domains));
        }

        let ancestor_ids: Vec<EntityId> = ancestors.iter().cloned().collect();
        let memberships = self.memberships.find_in(user_id, &ancestor_ids).await?;
        tracing::debug!(
            domain = D::NAME,
            resource_id = %resource_id,
            domains = domains.len(),
            ancestors = ancestors.len(),
            memberships = memberships.len(),
            "resolved resource ancestors"
        );
        Ok(AncestorResolution {
            domains,
            ancestors,
            memberships,
        })
    }
}

fn parent_set(edges: Vec<ContainmentEdge>) -> BTreeSet<EntityId> {
    edges.into_iter().map(|edge| edge.parent_id).collect()
}
