//! Cluster access domain.
//!
//! Clusters are the tenant boundary for content: resources hang off domains,
//! domains hang off clusters, and memberships live on clusters. This is the
//! only domain whose resources are resolved through containment edges.
use crate::domain::vocabulary_string_impls;
use crate::table::TableRow;
use crate::{AccessDomain, AuthzError, EntityKind, PermissionTable, Vocabulary};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterRole {
    Owner,
    Admin,
    Editor,
    Member,
}

impl Vocabulary for ClusterRole {
    const ALL: &'static [Self] = &[
        ClusterRole::Owner,
        ClusterRole::Admin,
        ClusterRole::Editor,
        ClusterRole::Member,
    ];

    fn as_str(self) -> &'static str {
        match self {
            ClusterRole::Owner => "owner",
            ClusterRole::Admin => "admin",
            ClusterRole::Editor => "editor",
            ClusterRole::Member => "member",
        }
    }
}

vocabulary_string_impls!(ClusterRole, AuthzError::UnknownRole);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClusterPermission {
    ManageMembers,
    ManageCluster,
    CreateContent,
    EditContent,
    DeleteContent,
}

impl Vocabulary for ClusterPermission {
    const ALL: &'static [Self] = &[
        ClusterPermission::ManageMembers,
        ClusterPermission::ManageCluster,
        ClusterPermission::CreateContent,
        ClusterPermission::EditContent,
        ClusterPermission::DeleteContent,
    ];

    fn as_str(self) -> &'static str {
        match self {
            ClusterPermission::ManageMembers => "manageMembers",
            ClusterPermission::ManageCluster => "manageCluster",
            ClusterPermission::CreateContent => "createContent",
            ClusterPermission::EditContent => "editContent",
            ClusterPermission::DeleteContent => "deleteContent",
        }
    }
}

vocabulary_string_impls!(ClusterPermission, AuthzError::UnknownPermission);

const CLUSTER_TABLE: &[TableRow<ClusterDomain>] = &[
    (
        ClusterRole::Owner,
        &[
            (ClusterPermission::ManageMembers, true),
            (ClusterPermission::ManageCluster, true),
            (ClusterPermission::CreateContent, true),
            (ClusterPermission::EditContent, true),
            (ClusterPermission::DeleteContent, true),
        ],
    ),
    (
        ClusterRole::Admin,
        &[
            (ClusterPermission::ManageMembers, true),
            (ClusterPermission::ManageCluster, false),
            (ClusterPermission::CreateContent, true),
            (ClusterPermission::EditContent, true),
            (ClusterPermission::DeleteContent, true),
        ],
    ),
    (
        ClusterRole::Editor,
        &[
            (ClusterPermission::ManageMembers, false),
            (ClusterPermission::ManageCluster, false),
            (ClusterPermission::CreateContent, true),
            (ClusterPermission::EditContent, true),
            (ClusterPermission::DeleteContent, false),
        ],
    ),
    (
        ClusterRole::Member,
        &[
            (ClusterPermission::ManageMembers, false),
            (ClusterPermission::ManageCluster, false),
            (ClusterPermission::CreateContent, false),
            (ClusterPermission::EditContent, false),
            (ClusterPermission::DeleteContent, false),
        ],
    ),
];

/// Marker type for the cluster access domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterDomain;

impl AccessDomain for ClusterDomain {
    type Role = ClusterRole;
    type Permission = ClusterPermission;

    const NAME: &'static str = "clusters";
    const SUBJECT: &'static str = "clusters";
    const ENTITY_KIND: EntityKind = EntityKind::Cluster;
    const OWNER_ROLE: ClusterRole = ClusterRole::Owner;
    const HIGHEST_ROLE: ClusterRole = ClusterRole::Owner;
    const LOWEST_ROLE: ClusterRole = ClusterRole::Member;
    const MANAGE_MEMBERS: ClusterPermission = ClusterPermission::ManageMembers;

    fn permission_table() -> &'static PermissionTable<Self> {
        static TABLE: OnceLock<PermissionTable<ClusterDomain>> = OnceLock::new();
        TABLE.get_or_init(|| {
            PermissionTable::new(CLUSTER_TABLE).expect("cluster permission table must be complete")
        })
    }

    fn resolves_through_containment(kind: EntityKind) -> bool {
        kind == EntityKind::Resource
    }
}
