mod common;

use common::{Fixture, user};
use std::sync::Arc;
use warden_authz::{
    ApplicationDomain, ApplicationPermission, ApplicationRole, ClusterDomain, ClusterPermission,
    ClusterRole, ContainmentLevel, EntityId, EntityKind, EntityRef, PlatformRole,
};
use warden_guard::global::PlatformSwitches;
use warden_guard::guard::{AccessError, AccessType, DenialKind, EffectiveMembership};
use warden_guard::manage::{MemberUpdate, MembershipManager};
use warden_guard::membership::MembershipResolver;
use warden_guard::store::StoreError;

async fn editor_under_domain() -> Fixture {
    let fx = Fixture::new();
    fx.entity(EntityKind::Cluster, "c1").await;
    fx.entity(EntityKind::Resource, "r1").await;
    fx.edge(ContainmentLevel::ResourceInDomain, "r1", "d1").await;
    fx.edge(ContainmentLevel::DomainInCluster, "d1", "c1").await;
    fx.member("clusters", "u1", "c1", "editor").await;
    fx
}

#[tokio::test]
async fn editor_inherits_edit_but_not_delete_through_domain() {
    let fx = editor_under_domain().await;
    let (guard, mut audit) = fx.audited_guard::<ClusterDomain>(PlatformSwitches::default());
    let resource = EntityRef::resource("r1");

    let context = guard
        .authorize(&user("u1"), &resource, Some(ClusterPermission::EditContent))
        .await
        .expect("editor may edit");
    assert_eq!(context.role, ClusterRole::Editor);
    assert_eq!(context.entity_id, EntityId::new("r1"));
    assert_eq!(context.access_type(), AccessType::Inherited);
    assert!(!context.is_synthetic());
    let inherited = context.stored_membership().expect("stored");
    assert_eq!(inherited.entity_id, EntityId::new("c1"));

    let err = guard
        .authorize(&user("u1"), &resource, Some(ClusterPermission::DeleteContent))
        .await
        .expect_err("editor may not delete");
    assert_eq!(err.denial_kind(), Some(DenialKind::InsufficientRole));
    assert_eq!(err.http_status(), 403);

    let event = audit.try_recv().expect("denial audited");
    assert_eq!(event.reason, DenialKind::InsufficientRole);
    assert_eq!(event.action, "deleteContent");
    assert_eq!(event.role.as_deref(), Some("editor"));
    assert_eq!(event.entity_id, EntityId::new("r1"));
    assert!(audit.try_recv().is_err());
}

#[tokio::test]
async fn wildcard_grant_yields_synthetic_owner() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Application, "a1").await;
    fx.platform_role("u1", PlatformRole::new("r-support", "support"), &[(
        "applications",
        "*",
    )])
    .await;
    let guard = fx.guard::<ApplicationDomain>(PlatformSwitches {
        global_rbac_enabled: true,
        superuser_enabled: false,
    });
    let writes_before = fx.store.membership_write_count();

    let context = guard
        .authorize(
            &user("u1"),
            &EntityRef::application("a1"),
            Some(ApplicationPermission::ManageApplication),
        )
        .await
        .expect("global grant opens the application");
    assert!(context.is_synthetic());
    assert_eq!(context.role, ApplicationRole::Owner);
    assert_eq!(context.global_role(), Some("support"));
    assert_eq!(context.access_type(), AccessType::GlobalGrant);
    assert!(!context.counts_as_member());

    assert_eq!(fx.store.membership_write_count(), writes_before);
    assert_eq!(fx.store.membership_count().await, 0);
}

#[tokio::test]
async fn grant_on_another_subject_does_not_bypass() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Application, "a1").await;
    fx.platform_role("u1", PlatformRole::new("r-ops", "ops"), &[("clusters", "*")])
        .await;
    let guard = fx.guard::<ApplicationDomain>(PlatformSwitches::all_enabled());

    let err = guard
        .authorize(&user("u1"), &EntityRef::application("a1"), None)
        .await
        .expect_err("clusters grant says nothing about applications");
    assert_eq!(err.denial_kind(), Some(DenialKind::NotMember));
}

#[tokio::test]
async fn admin_cannot_remove_owner() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Cluster, "cx").await;
    let owner_membership = fx.member("clusters", "owner", "cx", "owner").await;
    fx.member("clusters", "admin", "cx", "admin").await;
    let (guard, mut audit) = fx.audited_guard::<ClusterDomain>(PlatformSwitches::default());
    let guard = Arc::new(guard);
    let cluster = EntityRef::cluster("cx");

    let context = guard
        .authorize(&user("admin"), &cluster, Some(ClusterPermission::ManageMembers))
        .await
        .expect("admin manages members");
    assert_eq!(context.role, ClusterRole::Admin);

    let err = guard
        .authorize_member_change(&user("admin"), &cluster, &owner_membership)
        .await
        .expect_err("owner is protected");
    assert!(matches!(
        err,
        AccessError::Denied {
            kind: DenialKind::OwnerProtected,
            role: Some("admin"),
        }
    ));
    assert_eq!(
        audit.try_recv().expect("audited").reason,
        DenialKind::OwnerProtected
    );

    let manager = MembershipManager::new(fx.store.clone(), guard);
    let err = manager
        .remove_member(&user("admin"), &cluster, &owner_membership)
        .await
        .expect_err("owner is protected");
    assert_eq!(err.denial_kind(), Some(DenialKind::OwnerProtected));
    assert_eq!(fx.store.membership_count().await, 2);
}

#[tokio::test]
async fn superuser_cannot_remove_owner_either() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Cluster, "cx").await;
    let owner_membership = fx.member("clusters", "owner", "cx", "owner").await;
    fx.platform_role("root", PlatformRole::superuser("r-root", "superuser"), &[])
        .await;
    let guard = fx.guard::<ClusterDomain>(PlatformSwitches::all_enabled());

    let err = guard
        .authorize_member_change(&user("root"), &EntityRef::cluster("cx"), &owner_membership)
        .await
        .expect_err("owner is protected from superusers");
    assert_eq!(err.denial_kind(), Some(DenialKind::OwnerProtected));
}

#[tokio::test]
async fn admin_cannot_edit_owner_membership() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Cluster, "cx").await;
    let owner_membership = fx.member("clusters", "owner", "cx", "owner").await;
    fx.member("clusters", "admin", "cx", "admin").await;
    let guard = Arc::new(fx.guard::<ClusterDomain>(PlatformSwitches::default()));
    let manager = MembershipManager::new(fx.store.clone(), guard);
    let cluster = EntityRef::cluster("cx");

    let err = manager
        .update_member(&user("admin"), &cluster, &owner_membership, MemberUpdate {
            comment: Some(Some("handing over".to_string())),
            ..MemberUpdate::default()
        })
        .await
        .expect_err("owner comment is protected");
    assert_eq!(err.denial_kind(), Some(DenialKind::OwnerProtected));

    let err = manager
        .update_member(&user("admin"), &cluster, &owner_membership, MemberUpdate {
            role: Some(ClusterRole::Member),
            ..MemberUpdate::default()
        })
        .await
        .expect_err("owner cannot be demoted");
    assert_eq!(err.denial_kind(), Some(DenialKind::OwnerProtected));

    let stored = MembershipResolver::<ClusterDomain>::new(fx.store.clone())
        .find_by_id(&owner_membership)
        .await
        .expect("lookup")
        .expect("owner still present");
    assert_eq!(stored.role, ClusterRole::Owner);
    assert_eq!(stored.comment, None);
}

#[tokio::test]
async fn resources_never_receive_memberships() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Cluster, "c1").await;
    fx.entity(EntityKind::Resource, "r1").await;
    fx.edge(ContainmentLevel::ResourceInDomain, "r1", "d1").await;
    fx.edge(ContainmentLevel::DomainInCluster, "d1", "c1").await;
    fx.member("clusters", "admin", "c1", "admin").await;
    let guard = Arc::new(fx.guard::<ClusterDomain>(PlatformSwitches::default()));
    let manager = MembershipManager::new(fx.store.clone(), guard.clone());
    let resource = EntityRef::resource("r1");

    guard
        .authorize(&user("admin"), &resource, Some(ClusterPermission::ManageMembers))
        .await
        .expect("admin inherits member management on the resource");

    let err = manager
        .add_member(&user("admin"), &resource, &user("outsider"), ClusterRole::Admin, None)
        .await
        .expect_err("memberships attach to clusters only");
    assert!(matches!(err, AccessError::Store(StoreError::Invalid(_))));
    assert_eq!(fx.store.membership_count().await, 1);

    let err = guard
        .authorize(&user("outsider"), &resource, Some(ClusterPermission::DeleteContent))
        .await
        .expect_err("outsider has no cluster membership");
    assert_eq!(err.denial_kind(), Some(DenialKind::NotMember));
}

#[tokio::test]
async fn superuser_skips_table_and_never_writes() {
    let fx = editor_under_domain().await;
    fx.platform_role("root", PlatformRole::superuser("r-root", "superuser"), &[])
        .await;
    let guard = fx.guard::<ClusterDomain>(PlatformSwitches {
        global_rbac_enabled: false,
        superuser_enabled: true,
    });
    let writes_before = fx.store.membership_write_count();

    for target in [EntityRef::cluster("c1"), EntityRef::resource("r1")] {
        let context = guard
            .authorize(&user("root"), &target, Some(ClusterPermission::DeleteContent))
            .await
            .expect("superuser bypass");
        assert_eq!(context.access_type(), AccessType::Superuser);
        assert_eq!(context.global_role(), Some("superuser"));
        assert!(matches!(
            context.membership,
            EffectiveMembership::Synthetic(_)
        ));
    }
    assert_eq!(fx.store.membership_write_count(), writes_before);
}

#[tokio::test]
async fn disabled_switches_fall_through_to_membership() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Cluster, "c1").await;
    fx.platform_role("root", PlatformRole::superuser("r-root", "superuser"), &[("*", "*")])
        .await;
    let guard = fx.guard::<ClusterDomain>(PlatformSwitches::default());

    let err = guard
        .authorize(&user("root"), &EntityRef::cluster("c1"), None)
        .await
        .expect_err("no bypass while switches are off");
    assert_eq!(err.denial_kind(), Some(DenialKind::NotMember));
}

#[tokio::test]
async fn clusters_reached_twice_are_evaluated_once() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Resource, "r1").await;
    fx.edge(ContainmentLevel::ResourceInDomain, "r1", "d1").await;
    fx.edge(ContainmentLevel::ResourceInDomain, "r1", "d2").await;
    fx.edge(ContainmentLevel::DomainInCluster, "d1", "c1").await;
    fx.edge(ContainmentLevel::DomainInCluster, "d2", "c1").await;
    fx.member("clusters", "u1", "c1", "member").await;
    let guard = fx.guard::<ClusterDomain>(PlatformSwitches::default());

    let context = guard
        .authorize(&user("u1"), &EntityRef::resource("r1"), None)
        .await
        .expect("member via c1");
    assert_eq!(context.role, ClusterRole::Member);
}

#[tokio::test]
async fn most_permissive_ancestor_membership_wins() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Resource, "r1").await;
    fx.edge(ContainmentLevel::ResourceInDomain, "r1", "d1").await;
    fx.edge(ContainmentLevel::ResourceInDomain, "r1", "d2").await;
    fx.edge(ContainmentLevel::DomainInCluster, "d1", "c1").await;
    fx.edge(ContainmentLevel::DomainInCluster, "d2", "c2").await;
    fx.member("clusters", "u1", "c1", "member").await;
    fx.member("clusters", "u1", "c2", "admin").await;
    let guard = fx.guard::<ClusterDomain>(PlatformSwitches::default());

    let context = guard
        .authorize(&user("u1"), &EntityRef::resource("r1"), None)
        .await
        .expect("inherited");
    assert_eq!(context.role, ClusterRole::Admin);
    let context = guard
        .authorize(
            &user("u1"),
            &EntityRef::resource("r1"),
            Some(ClusterPermission::DeleteContent),
        )
        .await
        .expect("admin on c2 may delete");
    assert_eq!(
        context.stored_membership().expect("stored").entity_id,
        EntityId::new("c2")
    );
}

#[tokio::test]
async fn resource_in_cluster_shortcut() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Resource, "r1").await;
    fx.edge(ContainmentLevel::ResourceInCluster, "r1", "c9").await;
    fx.member("clusters", "u1", "c9", "editor").await;
    let guard = fx.guard::<ClusterDomain>(PlatformSwitches::default());

    let context = guard
        .authorize(
            &user("u1"),
            &EntityRef::resource("r1"),
            Some(ClusterPermission::CreateContent),
        )
        .await
        .expect("shortcut edge");
    assert_eq!(context.role, ClusterRole::Editor);
}

#[tokio::test]
async fn not_found_is_distinct_from_not_member() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Resource, "orphan").await;
    fx.entity(EntityKind::Resource, "r1").await;
    fx.edge(ContainmentLevel::ResourceInCluster, "r1", "c1").await;
    let guard = fx.guard::<ClusterDomain>(PlatformSwitches::default());

    let err = guard
        .authorize(&user("u1"), &EntityRef::resource("orphan"), None)
        .await
        .expect_err("no ancestors");
    assert_eq!(err.denial_kind(), Some(DenialKind::NotFound));
    assert_eq!(err.http_status(), 404);

    let err = guard
        .authorize(&user("u1"), &EntityRef::resource("unregistered"), None)
        .await
        .expect_err("unknown resource");
    assert_eq!(err.denial_kind(), Some(DenialKind::NotFound));

    let err = guard
        .authorize(&user("u1"), &EntityRef::resource("r1"), None)
        .await
        .expect_err("reachable but not a member");
    assert_eq!(err.denial_kind(), Some(DenialKind::NotMember));
    assert_eq!(err.http_status(), 403);
}

#[tokio::test]
async fn query_count_is_bounded_by_depth() {
    let fx = Fixture::new();
    fx.entity(EntityKind::Resource, "r1").await;
    for i in 0..12 {
        let domain = format!("d{i}");
        fx.edge(ContainmentLevel::ResourceInDomain, "r1", &domain).await;
        fx.edge(ContainmentLevel::DomainInCluster, &domain, &format!("c{}", i % 4))
            .await;
    }
    fx.member("clusters", "u1", "c3", "editor").await;
    let guard = fx.guard::<ClusterDomain>(PlatformSwitches::default());

    let before = fx.store.read_query_count();
    guard
        .authorize(
            &user("u1"),
            &EntityRef::resource("r1"),
            Some(ClusterPermission::EditContent),
        )
        .await
        .expect("editor via c3");
    // existence, direct membership, domains, clusters, ancestor memberships
    assert_eq!(fx.store.read_query_count() - before, 5);
}
