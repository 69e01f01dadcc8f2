use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("unknown permission: {0}")]
    UnknownPermission(String),
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid entity kind: {0}")]
    InvalidEntityKind(String),
    #[error("invalid containment level: {0}")]
    InvalidContainmentLevel(String),
    #[error("permission table for {domain} has no row for role {role}")]
    MissingRole { domain: &'static str, role: String },
    #[error("permission table for {domain}: role {role} does not define {permission}")]
    MissingPermission {
        domain: &'static str,
        role: String,
        permission: String,
    },
    #[error("permission table for {domain}: role {role} defines {permission} twice")]
    DuplicatePermission {
        domain: &'static str,
        role: String,
        permission: String,
    },
    #[error("invalid grant: {0}")]
    InvalidGrant(String),
}

pub type AuthzResult<T> = Result<T, AuthzError>;
