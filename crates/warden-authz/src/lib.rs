//! Warden authorization model shared by every access domain.
//!
//! # Purpose
//! Centralizes the role/permission vocabularies, per-domain permission
//! tables, global `subject/action` grants with their wildcard matcher, and the
//! containment edge model used to reach nested resources.
//!
//! # How it fits
//! `warden-guard` resolves which role applies to a user on an entity; this
//! crate answers what that role may do. Nothing here performs I/O.
//!
//! # Key invariants
//! - Each access domain owns a closed vocabulary; permissions are never shared
//!   across domains.
//! - Permissiveness is permission-specific. There is no global role ranking.
//! - Global grants match on exact strings with a single `*` escape per field.
//!
//! # Examples
//! ```rust
//! use warden_authz::{AccessDomain, ApplicationDomain, ApplicationPermission, ApplicationRole};
//!
//! let table = ApplicationDomain::permission_table();
//! assert!(table.lookup(ApplicationRole::Developer, ApplicationPermission::Deploy));
//! assert!(!table.lookup(ApplicationRole::Viewer, ApplicationPermission::Deploy));
//! ```
//!
//! # Common pitfalls
//! - Treating a role's position in its vocabulary as a rank; use
//!   [`PermissionTable::compare_permissiveness`] instead.
//! - Passing user input as a permission; permissions are compile-time constants.

mod application;
mod cluster;
mod containment;
mod domain;
mod errors;
mod grant;
mod matcher;
mod table;
mod types;

pub use application::{ApplicationDomain, ApplicationPermission, ApplicationRole};
pub use cluster::{ClusterDomain, ClusterPermission, ClusterRole};
pub use containment::{ContainmentEdge, ContainmentLevel};
pub use domain::{AccessDomain, Vocabulary};
pub use errors::{AuthzError, AuthzResult};
pub use grant::{
    ACTION_CREATE, ACTION_DELETE, ACTION_READ, ACTION_UPDATE, ADMIN_SURFACE_SUBJECTS,
    PermissionGrant, PlatformRole, SUBJECT_INSTANCES, SUBJECT_ROLES, SUBJECT_USERS, WILDCARD,
};
pub use matcher::{GrantMatcher, field_matches};
pub use table::{PermissionTable, TableRow};
pub use types::{EntityId, EntityKind, EntityRef, MembershipId, RoleId, UserId};
