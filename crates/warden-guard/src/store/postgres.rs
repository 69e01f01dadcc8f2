//! Postgres-backed implementation of the authorization store.
//!
//! # What this module is
//! Implements every store trait using Postgres (via `sqlx`) as the durable,
//! shared source of memberships, containment edges, platform roles and
//! global grants.
//!
//! # Key invariants
//! - `(scope, user_id, entity_id)` is unique in `memberships`.
//! - `(role_id, subject, action)` is the primary key of `permission_grants`,
//!   so duplicate grants surface as [`StoreError::Conflict`].
//! - Batched reads use `= ANY($n)` so each containment level is one query.
//!
//! # Security notes
//! - Database URLs may contain credentials; avoid logging them.
//! - No dynamic SQL: every statement is a fixed string with bound parameters.
//!
//! # Operational notes
//! - Migrations under `./migrations` run at connect time.
//! - Connect and acquire timeouts come from [`PostgresConfig`]; hanging forever
//!   on a dead database is not acceptable for a per-request guard.
use super::{
    AuthzStore, ContainmentStore, EntityStore, GrantStore, MembershipPatch, MembershipRecord,
    MembershipStore, NewMembership, StoreError, StoreResult,
};
use crate::config::PostgresConfig;
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;
use warden_authz::{
    ContainmentEdge, ContainmentLevel, EntityId, EntityKind, MembershipId, PermissionGrant,
    PlatformRole, RoleId, UserId,
};

static MIGRATOR: Migrator = sqlx::migrate!();

/// Durable authorization store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use warden_guard::config::PostgresConfig;
/// use warden_guard::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, Clone, FromRow)]
struct DbMembership {
    id: Uuid,
    scope: String,
    user_id: String,
    entity_id: String,
    role: String,
    granted_by: Option<String>,
    comment: Option<String>,
}

impl From<DbMembership> for MembershipRecord {
    fn from(row: DbMembership) -> Self {
        MembershipRecord {
            id: MembershipId::from_uuid(row.id),
            scope: row.scope,
            user_id: UserId::new(row.user_id),
            entity_id: EntityId::new(row.entity_id),
            role: row.role,
            granted_by: row.granted_by.map(UserId::new),
            comment: row.comment,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbEdge {
    child_id: String,
    parent_id: String,
}

#[derive(Debug, Clone, FromRow)]
struct DbRole {
    id: String,
    codename: String,
    superuser: bool,
}

impl From<DbRole> for PlatformRole {
    fn from(row: DbRole) -> Self {
        PlatformRole {
            id: RoleId::new(row.id),
            codename: row.codename,
            superuser: row.superuser,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbGrant {
    role_id: String,
    subject: String,
    action: String,
    conditions: Option<Value>,
    fields: Option<Value>,
}

impl TryFrom<DbGrant> for PermissionGrant {
    type Error = StoreError;

    fn try_from(row: DbGrant) -> Result<Self, Self::Error> {
        let fields = row
            .fields
            .map(serde_json::from_value::<Vec<String>>)
            .transpose()
            .map_err(|err| StoreError::Unexpected(anyhow!("decode grant fields: {err}")))?;
        Ok(PermissionGrant {
            role_id: RoleId::new(row.role_id),
            subject: row.subject,
            action: row.action,
            conditions: row.conditions,
            fields,
        })
    }
}

const MEMBERSHIP_COLUMNS: &str = "id, scope, user_id, entity_id, role, granted_by, comment";

fn id_strings<'a, T: 'a>(ids: &'a [T], as_str: impl Fn(&'a T) -> &'a str) -> Vec<String> {
    ids.iter().map(|id| as_str(id).to_string()).collect()
}

impl PostgresStore {
    /// Connect, bound by the configured timeouts, and run migrations.
    ///
    /// # Errors
    /// - [`StoreError::Unexpected`] on invalid URLs, timeouts, connection or
    ///   migration failures.
    pub async fn connect(config: &PostgresConfig) -> StoreResult<Self> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|err| StoreError::Unexpected(anyhow!("invalid postgres url: {err}")))?;
        let connect = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect_with(options);
        let pool = tokio::time::timeout(Duration::from_millis(config.connect_timeout_ms), connect)
            .await
            .map_err(|_| StoreError::Unexpected(anyhow!("postgres connect timed out")))??;
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|err| StoreError::Unexpected(anyhow!("run migrations: {err}")))?;
        tracing::info!(
            max_connections = config.max_connections,
            "connected authorization store to postgres"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MembershipStore for PostgresStore {
    async fn find_membership(
        &self,
        scope: &str,
        user_id: &UserId,
        entity_id: &EntityId,
    ) -> StoreResult<Option<MembershipRecord>> {
        let row: Option<DbMembership> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE scope = $1 AND user_id = $2 AND entity_id = $3"
        ))
        .bind(scope)
        .bind(user_id.as_str())
        .bind(entity_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_memberships_in(
        &self,
        scope: &str,
        user_id: &UserId,
        entity_ids: &[EntityId],
    ) -> StoreResult<Vec<MembershipRecord>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<DbMembership> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE scope = $1 AND user_id = $2 AND entity_id = ANY($3) \
             ORDER BY entity_id"
        ))
        .bind(scope)
        .bind(user_id.as_str())
        .bind(id_strings(entity_ids, EntityId::as_str))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_membership_by_id(
        &self,
        scope: &str,
        id: &MembershipId,
    ) -> StoreResult<Option<MembershipRecord>> {
        let row: Option<DbMembership> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE scope = $1 AND id = $2"
        ))
        .bind(scope)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_membership(&self, membership: NewMembership) -> StoreResult<MembershipRecord> {
        let row: DbMembership = sqlx::query_as(&format!(
            "INSERT INTO memberships (id, scope, user_id, entity_id, role, granted_by, comment) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(membership.id.as_uuid())
        .bind(&membership.scope)
        .bind(membership.user_id.as_str())
        .bind(membership.entity_id.as_str())
        .bind(&membership.role)
        .bind(membership.granted_by.as_ref().map(UserId::as_str))
        .bind(membership.comment.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_membership(
        &self,
        scope: &str,
        id: &MembershipId,
        patch: MembershipPatch,
    ) -> StoreResult<MembershipRecord> {
        let (set_comment, comment) = match patch.comment {
            Some(comment) => (true, comment),
            None => (false, None),
        };
        let row: Option<DbMembership> = sqlx::query_as(&format!(
            "UPDATE memberships \
             SET role = COALESCE($3, role), \
                 comment = CASE WHEN $4 THEN $5 ELSE comment END \
             WHERE scope = $1 AND id = $2 \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(scope)
        .bind(id.as_uuid())
        .bind(patch.role.as_deref())
        .bind(set_comment)
        .bind(comment.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into)
            .ok_or_else(|| StoreError::NotFound(format!("membership {id}")))
    }

    async fn delete_membership(&self, scope: &str, id: &MembershipId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM memberships WHERE scope = $1 AND id = $2")
            .bind(scope)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("membership {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainmentStore for PostgresStore {
    async fn parents_of(
        &self,
        level: ContainmentLevel,
        child_ids: &[EntityId],
    ) -> StoreResult<Vec<ContainmentEdge>> {
        if child_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<DbEdge> = sqlx::query_as(
            "SELECT child_id, parent_id FROM containment_edges \
             WHERE level = $1 AND child_id = ANY($2) \
             ORDER BY child_id, parent_id",
        )
        .bind(level.as_str())
        .bind(id_strings(child_ids, EntityId::as_str))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| ContainmentEdge::new(level, row.child_id, row.parent_id))
            .collect())
    }

    async fn insert_edge(&self, edge: ContainmentEdge) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO containment_edges (level, child_id, parent_id) VALUES ($1, $2, $3)",
        )
        .bind(edge.level.as_str())
        .bind(edge.child_id.as_str())
        .bind(edge.parent_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GrantStore for PostgresStore {
    async fn roles_for_user(&self, user_id: &UserId) -> StoreResult<Vec<PlatformRole>> {
        let rows: Vec<DbRole> = sqlx::query_as(
            "SELECT r.id, r.codename, r.superuser FROM platform_roles r \
             JOIN user_platform_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = $1 ORDER BY r.id",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn superuser_role_for_user(
        &self,
        user_id: &UserId,
    ) -> StoreResult<Option<PlatformRole>> {
        let row: Option<DbRole> = sqlx::query_as(
            "SELECT r.id, r.codename, r.superuser FROM platform_roles r \
             JOIN user_platform_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = $1 AND r.superuser \
             ORDER BY r.id LIMIT 1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn grants_for_roles(&self, role_ids: &[RoleId]) -> StoreResult<Vec<PermissionGrant>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<DbGrant> = sqlx::query_as(
            "SELECT role_id, subject, action, conditions, fields FROM permission_grants \
             WHERE role_id = ANY($1) ORDER BY role_id, subject, action",
        )
        .bind(id_strings(role_ids, RoleId::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PermissionGrant::try_from).collect()
    }

    async fn upsert_role(&self, role: PlatformRole) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO platform_roles (id, codename, superuser) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET codename = EXCLUDED.codename, \
             superuser = EXCLUDED.superuser",
        )
        .bind(role.id.as_str())
        .bind(&role.codename)
        .bind(role.superuser)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_grant(&self, grant: PermissionGrant) -> StoreResult<()> {
        grant.validate()?;
        let fields = grant
            .fields
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| StoreError::Unexpected(anyhow!("encode grant fields: {err}")))?;
        sqlx::query(
            "INSERT INTO permission_grants (role_id, subject, action, conditions, fields) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(grant.role_id.as_str())
        .bind(&grant.subject)
        .bind(&grant.action)
        .bind(&grant.conditions)
        .bind(fields)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO user_platform_roles (user_id, role_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.as_str())
        .bind(role_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PostgresStore {
    async fn entity_exists(&self, kind: EntityKind, id: &EntityId) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM entities WHERE kind = $1 AND id = $2)",
        )
        .bind(kind.as_str())
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn register_entity(&self, kind: EntityKind, id: &EntityId) -> StoreResult<()> {
        sqlx::query("INSERT INTO entities (kind, id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(kind.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl AuthzStore for PostgresStore {
    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
