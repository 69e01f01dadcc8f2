use crate::{ACTION_READ, ADMIN_SURFACE_SUBJECTS, PermissionGrant, WILDCARD};

/// Two-field wildcard rule: the pattern is either `*` or must equal the value.
pub fn field_matches(pattern: &str, value: &str) -> bool {
    pattern == WILDCARD || pattern == value
}

/// Evaluates a user's global grants as a plain boolean OR.
#[derive(Debug, Clone, Default)]
pub struct GrantMatcher {
    grants: Vec<PermissionGrant>,
}

impl GrantMatcher {
    pub fn new(grants: Vec<PermissionGrant>) -> Self {
        Self { grants }
    }

    pub fn allows(&self, subject: &str, action: &str) -> bool {
        self.first_match(subject, action).is_some()
    }

    /// The first grant covering `(subject, action)`, for provenance.
    pub fn first_match(&self, subject: &str, action: &str) -> Option<&PermissionGrant> {
        self.grants
            .iter()
            .find(|grant| grant.matches(subject, action))
    }

    /// True when any admin-surface subject is readable.
    ///
    /// `read` is checked through the matcher, so both `read` and `*` grants
    /// on the subject qualify, as do subject wildcards.
    pub fn allows_admin_surface(&self) -> bool {
        ADMIN_SURFACE_SUBJECTS
            .iter()
            .any(|subject| self.allows(subject, ACTION_READ))
    }

    pub fn grants(&self) -> &[PermissionGrant] {
        &self.grants
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
