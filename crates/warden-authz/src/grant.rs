//! Platform roles and global subject/action grants.
//!
//! # Purpose
//! Global RBAC is a flat list of `(role, subject, action)` grants evaluated
//! independently of any entity membership. A platform role may additionally
//! carry the superuser flag, which bypasses every check.
//!
//! # Key invariants
//! - `subject` and `action` are exact strings or the single wildcard `*`.
//!   There is no prefix or glob matching.
//! - `(role_id, subject, action)` is unique per role; stores reject duplicates.
//! - `conditions` and `fields` are carried for callers but never evaluated here.
//!
//! # Examples
//! ```rust
//! use warden_authz::{PermissionGrant, RoleId};
//!
//! let grant = PermissionGrant::new(RoleId::new("ops"), "clusters", "*");
//! assert!(grant.matches("clusters", "delete"));
//! assert!(!grant.matches("domains", "read"));
//! ```
use crate::{AuthzError, AuthzResult, RoleId, field_matches};
use serde::{Deserialize, Serialize};

pub const WILDCARD: &str = "*";

pub const ACTION_READ: &str = "read";
pub const ACTION_CREATE: &str = "create";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_DELETE: &str = "delete";

pub const SUBJECT_ROLES: &str = "roles";
pub const SUBJECT_INSTANCES: &str = "instances";
pub const SUBJECT_USERS: &str = "users";

/// Subjects whose read access opens the platform administration surface.
pub const ADMIN_SURFACE_SUBJECTS: &[&str] = &[SUBJECT_ROLES, SUBJECT_INSTANCES, SUBJECT_USERS];

/// A platform-wide role such as `superuser` or `support`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformRole {
    pub id: RoleId,
    pub codename: String,
    /// Full bypass: holders skip every membership and permission check.
    pub superuser: bool,
}

impl PlatformRole {
    pub fn new(id: impl Into<RoleId>, codename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            codename: codename.into(),
            superuser: false,
        }
    }

    pub fn superuser(id: impl Into<RoleId>, codename: impl Into<String>) -> Self {
        Self {
            superuser: true,
            ..Self::new(id, codename)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub role_id: RoleId,
    pub subject: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl PermissionGrant {
    pub fn new(role_id: RoleId, subject: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            role_id,
            subject: subject.into(),
            action: action.into(),
            conditions: None,
            fields: None,
        }
    }

    /// Reject grants that can never match anything meaningful.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidGrant`] for empty fields or partial wildcards
    ///   such as `clusters*`.
    pub fn validate(&self) -> AuthzResult<()> {
        for (name, value) in [("subject", &self.subject), ("action", &self.action)] {
            if value.trim().is_empty() {
                return Err(AuthzError::InvalidGrant(format!("empty {name}")));
            }
            if value != WILDCARD && value.contains('*') {
                return Err(AuthzError::InvalidGrant(format!(
                    "{name} may only be '*' or an exact value: {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn is_full_bypass(&self) -> bool {
        self.subject == WILDCARD && self.action == WILDCARD
    }

    pub fn matches(&self, subject: &str, action: &str) -> bool {
        field_matches(&self.subject, subject) && field_matches(&self.action, action)
    }

    /// `subject:action` rendering used in logs.
    pub fn as_string(&self) -> String {
        format!("{}:{}", self.subject, self.action)
    }
}

impl std::fmt::Display for PermissionGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.role_id, self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(subject: &str, action: &str) -> PermissionGrant {
        PermissionGrant::new(RoleId::new("r1"), subject, action)
    }

    #[test]
    fn full_wildcard_matches_everything() {
        let g = grant("*", "*");
        assert!(g.is_full_bypass());
        assert!(g.matches("clusters", "delete"));
        assert!(g.matches("users", "read"));
    }

    #[test]
    fn subject_scoped_wildcard() {
        let g = grant("clusters", "*");
        assert!(g.matches("clusters", "read"));
        assert!(g.matches("clusters", "delete"));
        assert!(!g.matches("domains", "read"));
        assert!(!g.is_full_bypass());
    }

    #[test]
    fn action_scoped_wildcard() {
        let g = grant("*", "read");
        assert!(g.matches("clusters", "read"));
        assert!(g.matches("applications", "read"));
        assert!(!g.matches("clusters", "delete"));
    }

    #[test]
    fn exact_pair_only() {
        let g = grant("clusters", "read");
        assert!(g.matches("clusters", "read"));
        assert!(!g.matches("clusters", "update"));
        assert!(!g.matches("cluster", "read"));
    }

    #[test]
    fn validate_rejects_partial_wildcards() {
        assert!(grant("clusters*", "read").validate().is_err());
        assert!(grant("clusters", "re*").validate().is_err());
        assert!(grant(" ", "read").validate().is_err());
        assert!(grant("*", "*").validate().is_ok());
        assert!(grant("clusters", "read").validate().is_ok());
    }

    #[test]
    fn superuser_constructor_sets_flag() {
        let role = PlatformRole::superuser("r-root", "superuser");
        assert!(role.superuser);
        assert!(!PlatformRole::new("r-ops", "ops").superuser);
    }

    #[test]
    fn grant_serde_skips_empty_extras() {
        let json = serde_json::to_value(grant("clusters", "read")).expect("serialize");
        assert!(json.get("conditions").is_none());
        assert_eq!(json["subject"], "clusters");
    }
}
