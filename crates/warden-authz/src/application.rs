//! Application access domain.
//!
//! Applications carry their own membership table and are never reached
//! through containment edges.
use crate::domain::vocabulary_string_impls;
use crate::table::TableRow;
use crate::{AccessDomain, AuthzError, EntityKind, PermissionTable, Vocabulary};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationRole {
    Owner,
    Admin,
    Developer,
    Viewer,
}

impl Vocabulary for ApplicationRole {
    const ALL: &'static [Self] = &[
        ApplicationRole::Owner,
        ApplicationRole::Admin,
        ApplicationRole::Developer,
        ApplicationRole::Viewer,
    ];

    fn as_str(self) -> &'static str {
        match self {
            ApplicationRole::Owner => "owner",
            ApplicationRole::Admin => "admin",
            ApplicationRole::Developer => "developer",
            ApplicationRole::Viewer => "viewer",
        }
    }
}

vocabulary_string_impls!(ApplicationRole, AuthzError::UnknownRole);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplicationPermission {
    ManageMembers,
    ManageApplication,
    Deploy,
    ViewLogs,
}

impl Vocabulary for ApplicationPermission {
    const ALL: &'static [Self] = &[
        ApplicationPermission::ManageMembers,
        ApplicationPermission::ManageApplication,
        ApplicationPermission::Deploy,
        ApplicationPermission::ViewLogs,
    ];

    fn as_str(self) -> &'static str {
        match self {
            ApplicationPermission::ManageMembers => "manageMembers",
            ApplicationPermission::ManageApplication => "manageApplication",
            ApplicationPermission::Deploy => "deploy",
            ApplicationPermission::ViewLogs => "viewLogs",
        }
    }
}

vocabulary_string_impls!(ApplicationPermission, AuthzError::UnknownPermission);

const APPLICATION_TABLE: &[TableRow<ApplicationDomain>] = &[
    (
        ApplicationRole::Owner,
        &[
            (ApplicationPermission::ManageMembers, true),
            (ApplicationPermission::ManageApplication, true),
            (ApplicationPermission::Deploy, true),
            (ApplicationPermission::ViewLogs, true),
        ],
    ),
    (
        ApplicationRole::Admin,
        &[
            (ApplicationPermission::ManageMembers, true),
            (ApplicationPermission::ManageApplication, true),
            (ApplicationPermission::Deploy, true),
            (ApplicationPermission::ViewLogs, true),
        ],
    ),
    (
        ApplicationRole::Developer,
        &[
            (ApplicationPermission::ManageMembers, false),
            (ApplicationPermission::ManageApplication, false),
            (ApplicationPermission::Deploy, true),
            (ApplicationPermission::ViewLogs, true),
        ],
    ),
    (
        ApplicationRole::Viewer,
        &[
            (ApplicationPermission::ManageMembers, false),
            (ApplicationPermission::ManageApplication, false),
            (ApplicationPermission::Deploy, false),
            (ApplicationPermission::ViewLogs, true),
        ],
    ),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationDomain;

impl AccessDomain for ApplicationDomain {
    type Role = ApplicationRole;
    type Permission = ApplicationPermission;

    const NAME: &'static str = "applications";
    const SUBJECT: &'static str = "applications";
    const ENTITY_KIND: EntityKind = EntityKind::Application;
    const OWNER_ROLE: ApplicationRole = ApplicationRole::Owner;
    const HIGHEST_ROLE: ApplicationRole = ApplicationRole::Owner;
    const LOWEST_ROLE: ApplicationRole = ApplicationRole::Viewer;
    const MANAGE_MEMBERS: ApplicationPermission = ApplicationPermission::ManageMembers;

    fn permission_table() -> &'static PermissionTable<Self> {
        static TABLE: OnceLock<PermissionTable<ApplicationDomain>> = OnceLock::new();
        TABLE.get_or_init(|| {
            PermissionTable::new(APPLICATION_TABLE)
                .expect("application permission table must be complete")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_only_reads_logs() {
        let table = ApplicationDomain::permission_table();
        assert_eq!(
            table.granted(ApplicationRole::Viewer),
            vec![ApplicationPermission::ViewLogs]
        );
    }

    #[test]
    fn unknown_stored_role_is_viewer() {
        assert_eq!(
            ApplicationDomain::resolve_role(Some("maintainer")),
            ApplicationRole::Viewer
        );
        assert_eq!(ApplicationDomain::resolve_role(None), ApplicationRole::Viewer);
        assert_eq!(
            ApplicationDomain::resolve_role(Some("developer")),
            ApplicationRole::Developer
        );
    }

    #[test]
    fn owner_and_admin_tie_breaks_to_owner() {
        let table = ApplicationDomain::permission_table();
        assert_eq!(
            table.most_permissive([ApplicationRole::Admin, ApplicationRole::Owner]),
            Some(ApplicationRole::Owner)
        );
    }

    #[test]
    fn applications_never_use_containment() {
        assert!(!ApplicationDomain::resolves_through_containment(
            EntityKind::Resource
        ));
    }
}
