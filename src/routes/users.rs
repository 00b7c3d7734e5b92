//! Directory endpoints for accounts and their customer/agent profiles.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize, permissions, Principal};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::user::{Agent, Customer, DbUser, User};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses(
        (status = 200, description = "All active accounts", body = Vec<User>),
        (status = 403, description = "Caller may not view users")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<User>>> {
    authorize(&principal, &[], &[permissions::VIEW_USERS]).require()?;

    let db_users = sqlx::query_as::<_, DbUser>(
        "SELECT id, first_name, last_name, email, password_hash, role, created_at, updated_at, deleted_at FROM accounts WHERE deleted_at IS NULL ORDER BY created_at",
    )
    .fetch_all(&state.pool)
    .await?;

    let users = db_users
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(users))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, description = "Caller may not delete users"),
        (status = 404, description = "Account not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(account_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[], &[permissions::DELETE_USERS]).require()?;

    if account_id == principal.account_id {
        return Err(AppError::bad_request("cannot delete your own account"));
    }

    let db_user = super::auth::fetch_account_by_id(&state.pool, account_id).await?;
    let user: User = db_user.try_into()?;

    let now = utc_now();
    sqlx::query("UPDATE accounts SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(account_id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "deleted", Some(principal.account_id), &user);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/agents",
    tag = "Users",
    responses(
        (status = 200, description = "All agent profiles", body = Vec<Agent>),
        (status = 403, description = "Caller may not view agents")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_agents(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Agent>>> {
    authorize(&principal, &[], &[permissions::VIEW_AGENTS]).require()?;

    let rows = sqlx::query(
        r#"
        SELECT g.id, g.account_id, g.agent_name, g.skillset, g.availability
        FROM agents g
        INNER JOIN accounts a ON a.id = g.account_id
        WHERE a.deleted_at IS NULL
        ORDER BY g.agent_name
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.iter().map(agent_from_row).collect()))
}

#[utoipa::path(
    get,
    path = "/customers",
    tag = "Users",
    responses(
        (status = 200, description = "All customer profiles", body = Vec<Customer>),
        (status = 403, description = "Caller may not view customers")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_customers(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<Customer>>> {
    authorize(&principal, &[], &[permissions::VIEW_CUSTOMERS]).require()?;

    let rows = sqlx::query(
        r#"
        SELECT c.id, c.account_id, c.customer_name, c.phone, c.address
        FROM customers c
        INNER JOIN accounts a ON a.id = c.account_id
        WHERE a.deleted_at IS NULL
        ORDER BY c.customer_name
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.iter().map(customer_from_row).collect()))
}

fn agent_from_row(row: &SqliteRow) -> Agent {
    Agent {
        id: row.get("id"),
        account_id: Uuid::parse_str(row.get::<&str, _>("account_id")).unwrap_or_default(),
        agent_name: row.get("agent_name"),
        skillset: row.get("skillset"),
        availability: row.get("availability"),
    }
}

fn customer_from_row(row: &SqliteRow) -> Customer {
    Customer {
        id: row.get("id"),
        account_id: Uuid::parse_str(row.get::<&str, _>("account_id")).unwrap_or_default(),
        customer_name: row.get("customer_name"),
        phone: row.get("phone"),
        address: row.get("address"),
    }
}
