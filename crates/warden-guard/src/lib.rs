//! Warden access guard library crate.
//!
//! # Purpose
//! Decides whether a user may act on a cluster, an application or a resource
//! nested under clusters. Combines platform-wide bypass (superusers and
//! wildcard grants), direct memberships and containment inheritance into a
//! single [`guard::AccessGuard`] call per request.
//!
//! # How it fits
//! Callers establish identity upstream, then hand the guard a user id, a
//! target and an optional permission from `warden-authz`. The guard returns
//! an access context or a typed denial that a transport adapter maps to a
//! status code.
//!
//! # Notes
//! Module boundaries follow the resolution pipeline: `global`, `membership`
//! and `containment` resolve, `synthetic` elevates, `guard` decides, `audit`
//! reports.
pub mod audit;
pub mod config;
pub mod containment;
pub mod global;
pub mod guard;
pub mod manage;
pub mod membership;
pub mod observability;
pub mod store;
pub mod synthetic;

pub use guard::{AccessContext, AccessError, AccessGuard, AccessResult, DenialKind};
