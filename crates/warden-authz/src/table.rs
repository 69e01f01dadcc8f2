//! Per-domain permission tables.
//!
//! # Purpose
//! Maps every role of an access domain to a boolean flag for every
//! permission of that domain. Tables are pure data; the guard consults them
//! after it has resolved which role applies.
//!
//! # Key invariants
//! - A table is complete: each role row names each permission exactly once.
//!   Construction fails loudly otherwise, since the vocabularies are closed.
//! - Unknown role tokens fall back to the domain's lowest role.
//! - Unknown permission tokens are an error, never a silent `false`.
//!
//! # Examples
//! ```rust
//! use warden_authz::{AccessDomain, ClusterDomain, ClusterPermission, ClusterRole};
//!
//! let table = ClusterDomain::permission_table();
//! assert!(table.lookup(ClusterRole::Editor, ClusterPermission::EditContent));
//! assert!(!table.lookup(ClusterRole::Editor, ClusterPermission::DeleteContent));
//! ```
use crate::{AccessDomain, AuthzError, AuthzResult, Vocabulary};
use std::cmp::Ordering;
use std::collections::HashMap;

/// One role row: the role and its permission flags.
pub type TableRow<D> = (
    <D as AccessDomain>::Role,
    &'static [(<D as AccessDomain>::Permission, bool)],
);

pub struct PermissionTable<D: AccessDomain> {
    rows: HashMap<D::Role, HashMap<D::Permission, bool>>,
}

impl<D: AccessDomain> PermissionTable<D> {
    /// Build and validate a table from static rows.
    ///
    /// # Errors
    /// - [`AuthzError::MissingRole`] when a role of the domain has no row.
    /// - [`AuthzError::MissingPermission`] when a row omits a permission.
    /// - [`AuthzError::DuplicatePermission`] when a row repeats a permission.
    pub fn new(rows: &[TableRow<D>]) -> AuthzResult<Self> {
        let mut table = HashMap::with_capacity(rows.len());
        for (role, flags) in rows {
            let mut row = HashMap::with_capacity(flags.len());
            for (permission, allowed) in flags.iter() {
                if row.insert(*permission, *allowed).is_some() {
                    return Err(AuthzError::DuplicatePermission {
                        domain: D::NAME,
                        role: role.to_string(),
                        permission: permission.to_string(),
                    });
                }
            }
            table.insert(*role, row);
        }

        for role in D::Role::ALL {
            let row = table.get(role).ok_or_else(|| AuthzError::MissingRole {
                domain: D::NAME,
                role: role.to_string(),
            })?;
            if let Some(missing) = D::Permission::ALL.iter().find(|p| !row.contains_key(*p)) {
                return Err(AuthzError::MissingPermission {
                    domain: D::NAME,
                    role: role.to_string(),
                    permission: missing.to_string(),
                });
            }
        }

        Ok(Self { rows: table })
    }

    pub fn lookup(&self, role: D::Role, permission: D::Permission) -> bool {
        self.rows
            .get(&role)
            .and_then(|row| row.get(&permission))
            .copied()
            .unwrap_or(false)
    }

    /// Look up by raw tokens, as stored in membership rows or config.
    ///
    /// An absent or unknown role is treated as the lowest role.
    ///
    /// # Errors
    /// - [`AuthzError::UnknownPermission`] if `permission` is not in the vocabulary.
    pub fn lookup_token(&self, role: Option<&str>, permission: &str) -> AuthzResult<bool> {
        let permission = D::Permission::from_token(permission)
            .ok_or_else(|| AuthzError::UnknownPermission(permission.to_string()))?;
        Ok(self.lookup(D::resolve_role(role), permission))
    }

    /// Permissions granted to `role`, in vocabulary order.
    pub fn granted(&self, role: D::Role) -> Vec<D::Permission> {
        D::Permission::ALL
            .iter()
            .copied()
            .filter(|permission| self.lookup(role, *permission))
            .collect()
    }

    /// Order two roles by how many permissions they grant.
    ///
    /// Ties go to the role declared earlier in the vocabulary. `Greater`
    /// means `a` is the more permissive role.
    pub fn compare_permissiveness(&self, a: D::Role, b: D::Role) -> Ordering {
        self.granted(a)
            .len()
            .cmp(&self.granted(b).len())
            .then_with(|| b.ordinal().cmp(&a.ordinal()))
    }

    pub fn most_permissive(&self, roles: impl IntoIterator<Item = D::Role>) -> Option<D::Role> {
        roles
            .into_iter()
            .max_by(|a, b| self.compare_permissiveness(*a, *b))
    }
}
