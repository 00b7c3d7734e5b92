//! RBAC admin endpoints: roles, permissions and their assignments.
//!
//! Everything here requires the admin role. Mutations are logged with
//! Critical severity so the permission history is always reconstructible.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize, roles, Principal};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::rbac::{
    AccountRole, AssignPermissionToRoleRequest, AssignRoleRequest, EffectivePermission, EffectivePermissions,
    Permission, PermissionCreateRequest, Role, RoleCreateRequest, RolePermission,
};
use crate::utils::is_valid_slug;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:role_id", get(get_role).delete(delete_role))
        .route(
            "/roles/:role_id/permissions",
            get(get_role_permissions).post(assign_permission_to_role),
        )
        .route(
            "/roles/:role_id/permissions/:permission_id",
            delete(revoke_permission_from_role),
        )
        .route("/permissions", get(list_permissions).post(create_permission))
        .route(
            "/users/:account_id/roles",
            get(get_account_roles).post(assign_role_to_account),
        )
        .route("/users/:account_id/roles/:role_id", delete(revoke_role_from_account))
        .route(
            "/users/:account_id/effective-permissions",
            get(get_effective_permissions),
        )
}

// =============================================================================
// ROLE ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/roles",
    tag = "RBAC",
    responses((status = 200, description = "List of roles", body = Vec<Role>)),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Role>>> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    let rows = sqlx::query("SELECT id, name, slug, description FROM roles ORDER BY name")
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(rows.iter().map(role_from_row).collect()))
}

#[utoipa::path(
    post,
    path = "/rbac/roles",
    tag = "RBAC",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 409, description = "Role slug already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    if !is_valid_slug(&req.slug) {
        return Err(AppError::bad_request("slug must be lowercase with underscores"));
    }
    ensure_slug_available(&state.pool, "roles", &req.slug).await?;

    let id = Uuid::new_v4();

    sqlx::query("INSERT INTO roles (id, name, slug, description) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(&req.name)
        .bind(&req.slug)
        .bind(&req.description)
        .execute(&state.pool)
        .await?;

    let role = Role {
        id,
        name: req.name,
        slug: req.slug,
        description: req.description,
    };

    log_activity(&state.event_bus, "created", Some(principal.account_id), &role);

    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/rbac/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role details", body = Role),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(role_id): Path<Uuid>,
) -> AppResult<Json<Role>> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    let role = fetch_role(&state.pool, role_id).await?;
    Ok(Json(role))
}

#[utoipa::path(
    delete,
    path = "/rbac/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(role_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    let role = fetch_role(&state.pool, role_id).await?;

    // Pivot rows cascade, so every holder loses the role's permissions on
    // their next request.
    sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(role_id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "deleted", Some(principal.account_id), &role);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/rbac/roles/{role_id}/permissions",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses((status = 200, description = "Permissions assigned to the role", body = Vec<Permission>)),
    security(("bearerAuth" = []))
)]
pub async fn get_role_permissions(
    State(state): State<AppState>,
    principal: Principal,
    Path(role_id): Path<Uuid>,
) -> AppResult<Json<Vec<Permission>>> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    let rows = sqlx::query(
        r#"
        SELECT p.id, p.name, p.slug
        FROM permissions p
        INNER JOIN permissions_roles pr ON p.id = pr.permission_id
        WHERE pr.role_id = ?
        ORDER BY p.slug
        "#,
    )
    .bind(role_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.iter().map(permission_from_row).collect()))
}

#[utoipa::path(
    post,
    path = "/rbac/roles/{role_id}/permissions",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    request_body = AssignPermissionToRoleRequest,
    responses(
        (status = 201, description = "Permission assigned to role"),
        (status = 404, description = "Role or permission not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_permission_to_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(role_id): Path<Uuid>,
    Json(req): Json<AssignPermissionToRoleRequest>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    fetch_role(&state.pool, role_id).await?;
    ensure_permission_exists(&state.pool, req.permission_id).await?;

    sqlx::query("INSERT OR IGNORE INTO permissions_roles (role_id, permission_id) VALUES (?, ?)")
        .bind(role_id.to_string())
        .bind(req.permission_id.to_string())
        .execute(&state.pool)
        .await?;

    let edge = RolePermission {
        role_id,
        permission_id: req.permission_id,
    };
    log_activity(&state.event_bus, "assigned", Some(principal.account_id), &edge);

    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    delete,
    path = "/rbac/roles/{role_id}/permissions/{permission_id}",
    tag = "RBAC",
    params(
        ("role_id" = Uuid, Path, description = "Role ID"),
        ("permission_id" = Uuid, Path, description = "Permission ID"),
    ),
    responses((status = 204, description = "Permission removed from role")),
    security(("bearerAuth" = []))
)]
pub async fn revoke_permission_from_role(
    State(state): State<AppState>,
    principal: Principal,
    Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    sqlx::query("DELETE FROM permissions_roles WHERE role_id = ? AND permission_id = ?")
        .bind(role_id.to_string())
        .bind(permission_id.to_string())
        .execute(&state.pool)
        .await?;

    let edge = RolePermission { role_id, permission_id };
    log_activity(&state.event_bus, "revoked", Some(principal.account_id), &edge);

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// PERMISSION ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/permissions",
    tag = "RBAC",
    responses((status = 200, description = "List of permissions", body = Vec<Permission>)),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<Permission>>> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    let rows = sqlx::query("SELECT id, name, slug FROM permissions ORDER BY slug")
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(rows.iter().map(permission_from_row).collect()))
}

#[utoipa::path(
    post,
    path = "/rbac/permissions",
    tag = "RBAC",
    request_body = PermissionCreateRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "Permission slug already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_permission(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<PermissionCreateRequest>,
) -> AppResult<(StatusCode, Json<Permission>)> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    if !is_valid_slug(&req.slug) {
        return Err(AppError::bad_request("slug must be lowercase with underscores"));
    }
    ensure_slug_available(&state.pool, "permissions", &req.slug).await?;

    let id = Uuid::new_v4();

    sqlx::query("INSERT INTO permissions (id, name, slug) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(&req.name)
        .bind(&req.slug)
        .execute(&state.pool)
        .await?;

    let permission = Permission {
        id,
        name: req.name,
        slug: req.slug,
    };

    log_activity(&state.event_bus, "created", Some(principal.account_id), &permission);

    Ok((StatusCode::CREATED, Json(permission)))
}

// =============================================================================
// ACCOUNT-ROLE ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/users/{account_id}/roles",
    tag = "RBAC",
    params(("account_id" = Uuid, Path, description = "Account ID")),
    responses((status = 200, description = "Roles held by the account", body = Vec<Role>)),
    security(("bearerAuth" = []))
)]
pub async fn get_account_roles(
    State(state): State<AppState>,
    principal: Principal,
    Path(account_id): Path<Uuid>,
) -> AppResult<Json<Vec<Role>>> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    let rows = sqlx::query(
        r#"
        SELECT r.id, r.name, r.slug, r.description
        FROM roles r
        INNER JOIN accounts_roles ar ON r.id = ar.role_id
        WHERE ar.account_id = ?
        ORDER BY r.name
        "#,
    )
    .bind(account_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.iter().map(role_from_row).collect()))
}

#[utoipa::path(
    post,
    path = "/rbac/users/{account_id}/roles",
    tag = "RBAC",
    params(("account_id" = Uuid, Path, description = "Account ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 201, description = "Role assigned"),
        (status = 404, description = "Account or role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role_to_account(
    State(state): State<AppState>,
    principal: Principal,
    Path(account_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    ensure_account_exists(&state.pool, account_id).await?;
    fetch_role(&state.pool, req.role_id).await?;

    sqlx::query("INSERT OR IGNORE INTO accounts_roles (account_id, role_id) VALUES (?, ?)")
        .bind(account_id.to_string())
        .bind(req.role_id.to_string())
        .execute(&state.pool)
        .await?;

    let edge = AccountRole {
        account_id,
        role_id: req.role_id,
    };
    log_activity(&state.event_bus, "assigned", Some(principal.account_id), &edge);

    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    delete,
    path = "/rbac/users/{account_id}/roles/{role_id}",
    tag = "RBAC",
    params(
        ("account_id" = Uuid, Path, description = "Account ID"),
        ("role_id" = Uuid, Path, description = "Role ID"),
    ),
    responses((status = 204, description = "Role revoked")),
    security(("bearerAuth" = []))
)]
pub async fn revoke_role_from_account(
    State(state): State<AppState>,
    principal: Principal,
    Path((account_id, role_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    // Takes effect on the target's next request; permission snapshots are
    // never cached across requests.
    sqlx::query("DELETE FROM accounts_roles WHERE account_id = ? AND role_id = ?")
        .bind(account_id.to_string())
        .bind(role_id.to_string())
        .execute(&state.pool)
        .await?;

    let edge = AccountRole { account_id, role_id };
    log_activity(&state.event_bus, "revoked", Some(principal.account_id), &edge);

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// EFFECTIVE PERMISSIONS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/users/{account_id}/effective-permissions",
    tag = "RBAC",
    params(("account_id" = Uuid, Path, description = "Account ID")),
    responses((status = 200, description = "Computed effective permissions", body = EffectivePermissions)),
    security(("bearerAuth" = []))
)]
pub async fn get_effective_permissions(
    State(state): State<AppState>,
    principal: Principal,
    Path(account_id): Path<Uuid>,
) -> AppResult<Json<EffectivePermissions>> {
    authorize(&principal, &[roles::ADMIN], &[]).require()?;

    ensure_account_exists(&state.pool, account_id).await?;

    let role_rows = sqlx::query(
        r#"
        SELECT r.slug
        FROM roles r
        INNER JOIN accounts_roles ar ON r.id = ar.role_id
        WHERE ar.account_id = ?
        ORDER BY r.slug
        "#,
    )
    .bind(account_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let held_roles: Vec<String> = role_rows.iter().map(|r| r.get("slug")).collect();

    let perm_rows = sqlx::query(
        r#"
        SELECT p.slug AS permission_slug, p.name AS permission_name, r.slug AS role_slug
        FROM permissions p
        INNER JOIN permissions_roles pr ON p.id = pr.permission_id
        INNER JOIN roles r ON r.id = pr.role_id
        INNER JOIN accounts_roles ar ON r.id = ar.role_id
        WHERE ar.account_id = ?
        ORDER BY p.slug, r.slug
        "#,
    )
    .bind(account_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let permissions: Vec<EffectivePermission> = perm_rows
        .iter()
        .map(|row| EffectivePermission {
            slug: row.get("permission_slug"),
            name: row.get("permission_name"),
            role_slug: row.get("role_slug"),
        })
        .collect();

    Ok(Json(EffectivePermissions {
        account_id,
        roles: held_roles,
        permissions,
    }))
}

// =============================================================================
// HELPERS
// =============================================================================

fn role_from_row(row: &SqliteRow) -> Role {
    Role {
        id: Uuid::parse_str(row.get::<&str, _>("id")).unwrap_or_default(),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

fn permission_from_row(row: &SqliteRow) -> Permission {
    Permission {
        id: Uuid::parse_str(row.get::<&str, _>("id")).unwrap_or_default(),
        name: row.get("name"),
        slug: row.get("slug"),
    }
}

async fn fetch_role(pool: &SqlitePool, role_id: Uuid) -> AppResult<Role> {
    let row = sqlx::query("SELECT id, name, slug, description FROM roles WHERE id = ?")
        .bind(role_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("role not found"))?;

    Ok(role_from_row(&row))
}

async fn ensure_permission_exists(pool: &SqlitePool, permission_id: Uuid) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM permissions WHERE id = ?")
        .bind(permission_id.to_string())
        .fetch_one(pool)
        .await?;

    if count == 0 {
        return Err(AppError::not_found("permission not found"));
    }

    Ok(())
}

async fn ensure_account_exists(pool: &SqlitePool, account_id: Uuid) -> AppResult<()> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM accounts WHERE id = ? AND deleted_at IS NULL")
            .bind(account_id.to_string())
            .fetch_one(pool)
            .await?;

    if count == 0 {
        return Err(AppError::not_found("account not found"));
    }

    Ok(())
}

async fn ensure_slug_available(pool: &SqlitePool, table: &str, slug: &str) -> AppResult<()> {
    let sql = format!("SELECT COUNT(1) FROM {table} WHERE slug = ?");
    let count: i64 = sqlx::query_scalar(&sql).bind(slug).fetch_one(pool).await?;

    if count > 0 {
        return Err(AppError::conflict("slug already in use"));
    }

    Ok(())
}
