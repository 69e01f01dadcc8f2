//! Access domains and their closed role/permission vocabularies.
//!
//! # Purpose
//! An access domain is a bounded context (clusters, applications) that owns
//! its own role enum, permission enum and permission table. The guard engine
//! is written once against [`AccessDomain`] and instantiated per domain.
//!
//! # Key invariants
//! - Vocabularies are closed: every token is listed in [`Vocabulary::ALL`].
//! - Role vocabularies list roles from most to least privileged; this order
//!   is only a tie-breaker, permissiveness is always permission-specific.
//! - An unknown stored role token resolves to the domain's lowest role.
use crate::{EntityKind, PermissionTable};
use std::fmt;
use std::hash::Hash;

/// Closed set of string tokens backed by an enum.
pub trait Vocabulary:
    Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Every token in declaration order.
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn from_token(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|token| token.as_str() == value)
    }

    /// Position in [`Vocabulary::ALL`]; lower means declared earlier.
    fn ordinal(self) -> usize {
        Self::ALL
            .iter()
            .position(|token| *token == self)
            .unwrap_or(usize::MAX)
    }
}

/// A bounded authorization context with its own roles and permissions.
pub trait AccessDomain: Send + Sync + 'static {
    type Role: Vocabulary;
    type Permission: Vocabulary;

    /// Membership scope key, also used as a metrics label.
    const NAME: &'static str;
    /// Subject checked against global grants for platform bypass.
    const SUBJECT: &'static str;
    /// Kind of the top-level entity that carries memberships.
    const ENTITY_KIND: EntityKind;
    /// Role whose memberships can never be changed through member management.
    const OWNER_ROLE: Self::Role;
    /// Role assigned to synthetic memberships.
    const HIGHEST_ROLE: Self::Role;
    /// Role assumed when a stored role token is absent or unknown.
    const LOWEST_ROLE: Self::Role;
    /// Permission required to add, change or remove members.
    const MANAGE_MEMBERS: Self::Permission;

    fn permission_table() -> &'static PermissionTable<Self>
    where
        Self: Sized;

    /// Whether entities of `kind` are reached through containment edges
    /// rather than carrying their own memberships only.
    fn resolves_through_containment(_kind: EntityKind) -> bool {
        false
    }

    fn resolve_role(token: Option<&str>) -> Self::Role {
        token
            .and_then(Self::Role::from_token)
            .unwrap_or(Self::LOWEST_ROLE)
    }
}

/// Implements `Display` and `FromStr` for a [`Vocabulary`] enum.
macro_rules! vocabulary_string_impls {
    ($ty:ty, $err:path) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::Vocabulary::as_str(*self))
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::AuthzError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                <$ty as $crate::Vocabulary>::from_token(value)
                    .ok_or_else(|| $err(value.to_string()))
            }
        }
    };
}

pub(crate) use vocabulary_string_impls;
