use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{roles, Principal};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, DbUser, LoginRequest, MeResponse, RegisterRequest, User};
use crate::utils::{hash_password, utc_now, verify_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account registered", body = AuthResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    ensure_email_available(&state.pool, &payload.email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let account_id = Uuid::new_v4();

    // Self-registration always produces a customer account; agents and
    // admins are provisioned out of band.
    sqlx::query(
        "INSERT INTO accounts (id, first_name, last_name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(account_id.to_string())
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.email)
    .bind(password_hash)
    .bind("Customer")
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    sqlx::query(
        "INSERT OR IGNORE INTO accounts_roles (account_id, role_id) SELECT ?, id FROM roles WHERE slug = ?",
    )
    .bind(account_id.to_string())
    .bind(roles::CUSTOMER)
    .execute(&state.pool)
    .await?;

    sqlx::query("INSERT INTO customers (account_id, customer_name) VALUES (?, ?)")
        .bind(account_id.to_string())
        .bind(format!("{} {}", payload.first_name, payload.last_name))
        .execute(&state.pool)
        .await?;

    let db_user = fetch_account_by_id(&state.pool, account_id).await?;
    let user: User = db_user.try_into()?;
    let token = state.jwt.encode(user.id)?;

    log_activity(&state.event_bus, "registered", Some(account_id), &user);

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = sqlx::query_as::<_, DbUser>(
        "SELECT id, first_name, last_name, email, password_hash, role, created_at, updated_at, deleted_at FROM accounts WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&payload.email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    let token = state.jwt.encode(user.id)?;

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current account with resolved roles and permissions", body = MeResponse)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, principal: Principal) -> AppResult<Json<MeResponse>> {
    let db_user = fetch_account_by_id(&state.pool, principal.account_id).await?;
    let user: User = db_user.try_into()?;

    let mut roles: Vec<String> = principal.roles.iter().cloned().collect();
    roles.sort();
    let mut permissions: Vec<String> = principal.permissions.iter().cloned().collect();
    permissions.sort();

    Ok(Json(MeResponse { user, roles, permissions }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged")),
    security(("bearerAuth" = []))
)]
pub async fn logout(_auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    // Stateless tokens; the client discards its copy.
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM accounts WHERE email = ? AND deleted_at IS NULL")
            .bind(email)
            .fetch_one(pool)
            .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

pub(crate) async fn fetch_account_by_id(pool: &SqlitePool, account_id: Uuid) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, first_name, last_name, email, password_hash, role, created_at, updated_at, deleted_at FROM accounts WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(account_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("account not found"))
}
