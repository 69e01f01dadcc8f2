//! Platform-wide role resolution: superuser bypass and wildcard grants.
//!
//! # Purpose
//! Answers questions that do not depend on any entity membership: is this
//! user a superuser, does one of their platform roles grant
//! `subject/action`, and may they open the administration surface.
//!
//! # Key invariants
//! - Both switches are fixed at construction. A disabled switch answers
//!   `false` without touching the store.
//! - Matching is the two-field wildcard rule from
//!   [`warden_authz::field_matches`]; grants are OR-ed.
//! - Resolvers never deny. They return booleans or `Option`s and the guard
//!   decides.
use crate::store::{AuthzStore, StoreResult};
use std::sync::Arc;
use warden_authz::{GrantMatcher, PermissionGrant, PlatformRole, RoleId, UserId};

/// Feature switches for platform bypass. Unset means off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformSwitches {
    pub global_rbac_enabled: bool,
    pub superuser_enabled: bool,
}

impl PlatformSwitches {
    pub fn all_enabled() -> Self {
        Self {
            global_rbac_enabled: true,
            superuser_enabled: true,
        }
    }
}

#[derive(Clone)]
pub struct GlobalRoleResolver {
    store: Arc<dyn AuthzStore>,
    switches: PlatformSwitches,
}

impl GlobalRoleResolver {
    pub fn new(store: Arc<dyn AuthzStore>, switches: PlatformSwitches) -> Self {
        Self { store, switches }
    }

    pub fn switches(&self) -> PlatformSwitches {
        self.switches
    }

    pub async fn is_superuser(&self, user_id: &UserId) -> StoreResult<bool> {
        Ok(self.superuser_role(user_id).await?.is_some())
    }

    /// The superuser role held by `user_id`, kept for provenance.
    pub async fn superuser_role(&self, user_id: &UserId) -> StoreResult<Option<PlatformRole>> {
        if !self.switches.superuser_enabled {
            return Ok(None);
        }
        self.store.superuser_role_for_user(user_id).await
    }

    pub async fn has_global_grant(
        &self,
        user_id: &UserId,
        subject: &str,
        action: &str,
    ) -> StoreResult<bool> {
        Ok(self
            .matching_grant(user_id, subject, action)
            .await?
            .is_some())
    }

    /// First grant covering `(subject, action)` together with the role that
    /// carries it.
    pub async fn matching_grant(
        &self,
        user_id: &UserId,
        subject: &str,
        action: &str,
    ) -> StoreResult<Option<(PlatformRole, PermissionGrant)>> {
        let Some((roles, matcher)) = self.load_matcher(user_id).await? else {
            return Ok(None);
        };
        let Some(grant) = matcher.first_match(subject, action) else {
            return Ok(None);
        };
        let role = roles.into_iter().find(|role| role.id == grant.role_id);
        Ok(role.map(|role| (role, grant.clone())))
    }

    /// True when a grant covers `read` on one of `roles`, `instances` or `users`.
    pub async fn can_access_admin_surface(&self, user_id: &UserId) -> StoreResult<bool> {
        let Some((_, matcher)) = self.load_matcher(user_id).await? else {
            return Ok(false);
        };
        Ok(matcher.allows_admin_surface())
    }

    async fn load_matcher(
        &self,
        user_id: &UserId,
    ) -> StoreResult<Option<(Vec<PlatformRole>, GrantMatcher)>> {
        if !self.switches.global_rbac_enabled {
            return Ok(None);
        }
        let roles = self.store.roles_for_user(user_id).await?;
        if roles.is_empty() {
            return Ok(None);
        }
        let role_ids: Vec<RoleId> = roles.iter().map(|role| role.id.clone()).collect();
        let grants = self.store.grants_for_roles(&role_ids).await?;
        Ok(Some((roles, GrantMatcher::new(grants))))
    }
}
