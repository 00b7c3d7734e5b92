use std::collections::HashSet;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::user::RoleTag;

/// The authenticated account with its role and permission snapshot, resolved
/// at extraction time. Nothing here outlives the request, so a revoked
/// permission is gone on the very next call.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: Uuid,
    /// Coarse role tag stored on the account row.
    pub role: RoleTag,
    /// Role slugs from the accounts_roles pivot (plus the coarse tag).
    pub roles: HashSet<String>,
    /// Effective permission slugs: union over all held roles.
    pub permissions: HashSet<String>,
    /// Profile ids used for row-level ownership checks.
    pub customer_id: Option<i64>,
    pub agent_id: Option<i64>,
}

impl Principal {
    pub fn new(account_id: Uuid, role: RoleTag) -> Self {
        let mut roles = HashSet::new();
        roles.insert(role.slug().to_string());
        Self {
            account_id,
            role,
            roles,
            permissions: HashSet::new(),
            customer_id: None,
            agent_id: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(perms.into_iter().map(Into::into));
        self
    }

    pub fn with_customer_id(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_agent_id(mut self, agent_id: i64) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(super::roles::ADMIN)
    }

    /// Load the full snapshot for an account: role tag, role slugs, effective
    /// permissions and the optional customer/agent profile ids.
    pub async fn load(pool: &SqlitePool, account_id: Uuid) -> AppResult<Self> {
        let row = sqlx::query("SELECT role FROM accounts WHERE id = ? AND deleted_at IS NULL")
            .bind(account_id.to_string())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::unauthorized("account not found"))?;

        let role: RoleTag = row.get::<String, _>("role").parse()?;

        let role_rows = sqlx::query(
            r#"
            SELECT r.slug
            FROM roles r
            INNER JOIN accounts_roles ar ON r.id = ar.role_id
            WHERE ar.account_id = ?
            "#,
        )
        .bind(account_id.to_string())
        .fetch_all(pool)
        .await?;

        let permissions = effective_permissions(pool, account_id).await?;

        let customer_id: Option<i64> = sqlx::query_scalar("SELECT id FROM customers WHERE account_id = ?")
            .bind(account_id.to_string())
            .fetch_optional(pool)
            .await?;

        let agent_id: Option<i64> = sqlx::query_scalar("SELECT id FROM agents WHERE account_id = ?")
            .bind(account_id.to_string())
            .fetch_optional(pool)
            .await?;

        let mut principal = Principal::new(account_id, role)
            .with_roles(role_rows.iter().map(|r| r.get::<String, _>("slug")))
            .with_permissions(permissions);
        principal.customer_id = customer_id;
        principal.agent_id = agent_id;

        Ok(principal)
    }
}

/// Union of permission slugs over every role the account holds. Pure read of
/// the role/permission graph; no caching beyond the current request.
pub async fn effective_permissions(pool: &SqlitePool, account_id: Uuid) -> AppResult<HashSet<String>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT p.slug
        FROM permissions p
        INNER JOIN permissions_roles pr ON p.id = pr.permission_id
        INNER JOIN accounts_roles ar ON pr.role_id = ar.role_id
        WHERE ar.account_id = ?
        "#,
    )
    .bind(account_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|r| r.get::<String, _>("slug")).collect())
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        Principal::load(&state.pool, auth.account_id).await
    }
}
