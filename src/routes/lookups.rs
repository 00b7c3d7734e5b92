//! Department, priority and status catalogues. Reads are open to any
//! authenticated account; writes sit behind the manage_* permissions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::{authorize, permissions, Principal};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::ticket::{
    Department, DepartmentCreateRequest, PriorityCreateRequest, StatusCreateRequest, TicketPriority,
    TicketStatus,
};

#[utoipa::path(
    get,
    path = "/departments",
    tag = "Lookups",
    responses((status = 200, description = "All departments", body = Vec<Department>)),
    security(("bearerAuth" = []))
)]
pub async fn list_departments(
    State(state): State<AppState>,
    _principal: Principal,
) -> AppResult<Json<Vec<Department>>> {
    let departments = sqlx::query_as::<_, Department>(
        "SELECT id, department_name FROM departments ORDER BY department_name",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(departments))
}

#[utoipa::path(
    post,
    path = "/departments",
    tag = "Lookups",
    request_body = DepartmentCreateRequest,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 403, description = "Caller may not manage departments"),
        (status = 409, description = "Department name already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_department(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<DepartmentCreateRequest>,
) -> AppResult<(StatusCode, Json<Department>)> {
    authorize(&principal, &[], &[permissions::MANAGE_DEPARTMENTS]).require()?;
    ensure_name_available(&state, "departments", "department_name", &req.department_name).await?;

    let result = sqlx::query("INSERT INTO departments (department_name) VALUES (?)")
        .bind(&req.department_name)
        .execute(&state.pool)
        .await?;

    let department = Department {
        id: result.last_insert_rowid(),
        department_name: req.department_name,
    };

    log_activity(&state.event_bus, "created", Some(principal.account_id), &department);

    Ok((StatusCode::CREATED, Json(department)))
}

#[utoipa::path(
    delete,
    path = "/departments/{id}",
    tag = "Lookups",
    params(("id" = i64, Path, description = "Department ID")),
    responses(
        (status = 204, description = "Department deleted"),
        (status = 403, description = "Caller may not manage departments"),
        (status = 404, description = "Department not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_department(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[], &[permissions::MANAGE_DEPARTMENTS]).require()?;

    let department = sqlx::query_as::<_, Department>(
        "SELECT id, department_name FROM departments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("department not found"))?;

    sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "deleted", Some(principal.account_id), &department);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/priorities",
    tag = "Lookups",
    responses((status = 200, description = "All priorities", body = Vec<TicketPriority>)),
    security(("bearerAuth" = []))
)]
pub async fn list_priorities(
    State(state): State<AppState>,
    _principal: Principal,
) -> AppResult<Json<Vec<TicketPriority>>> {
    let priorities = sqlx::query_as::<_, TicketPriority>(
        "SELECT id, priority_name FROM ticket_priority ORDER BY id",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(priorities))
}

#[utoipa::path(
    post,
    path = "/priorities",
    tag = "Lookups",
    request_body = PriorityCreateRequest,
    responses(
        (status = 201, description = "Priority created", body = TicketPriority),
        (status = 403, description = "Caller may not manage priorities"),
        (status = 409, description = "Priority name already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_priority(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<PriorityCreateRequest>,
) -> AppResult<(StatusCode, Json<TicketPriority>)> {
    authorize(&principal, &[], &[permissions::MANAGE_PRIORITIES]).require()?;
    ensure_name_available(&state, "ticket_priority", "priority_name", &req.priority_name).await?;

    let result = sqlx::query("INSERT INTO ticket_priority (priority_name) VALUES (?)")
        .bind(&req.priority_name)
        .execute(&state.pool)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TicketPriority {
            id: result.last_insert_rowid(),
            priority_name: req.priority_name,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/priorities/{id}",
    tag = "Lookups",
    params(("id" = i64, Path, description = "Priority ID")),
    responses(
        (status = 204, description = "Priority deleted"),
        (status = 403, description = "Caller may not manage priorities"),
        (status = 404, description = "Priority not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_priority(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[], &[permissions::MANAGE_PRIORITIES]).require()?;
    delete_lookup_row(&state, "ticket_priority", id, "priority not found").await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/statuses",
    tag = "Lookups",
    responses((status = 200, description = "All statuses", body = Vec<TicketStatus>)),
    security(("bearerAuth" = []))
)]
pub async fn list_statuses(
    State(state): State<AppState>,
    _principal: Principal,
) -> AppResult<Json<Vec<TicketStatus>>> {
    let statuses =
        sqlx::query_as::<_, TicketStatus>("SELECT id, status_name FROM ticket_status ORDER BY id")
            .fetch_all(&state.pool)
            .await?;

    Ok(Json(statuses))
}

#[utoipa::path(
    post,
    path = "/statuses",
    tag = "Lookups",
    request_body = StatusCreateRequest,
    responses(
        (status = 201, description = "Status created", body = TicketStatus),
        (status = 403, description = "Caller may not manage statuses"),
        (status = 409, description = "Status name already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_status(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<StatusCreateRequest>,
) -> AppResult<(StatusCode, Json<TicketStatus>)> {
    authorize(&principal, &[], &[permissions::MANAGE_STATUSES]).require()?;
    ensure_name_available(&state, "ticket_status", "status_name", &req.status_name).await?;

    let result = sqlx::query("INSERT INTO ticket_status (status_name) VALUES (?)")
        .bind(&req.status_name)
        .execute(&state.pool)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TicketStatus {
            id: result.last_insert_rowid(),
            status_name: req.status_name,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/statuses/{id}",
    tag = "Lookups",
    params(("id" = i64, Path, description = "Status ID")),
    responses(
        (status = 204, description = "Status deleted"),
        (status = 403, description = "Caller may not manage statuses"),
        (status = 404, description = "Status not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[], &[permissions::MANAGE_STATUSES]).require()?;
    delete_lookup_row(&state, "ticket_status", id, "status not found").await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_name_available(state: &AppState, table: &str, column: &str, name: &str) -> AppResult<()> {
    let sql = format!("SELECT COUNT(1) FROM {table} WHERE {column} = ?");
    let count: i64 = sqlx::query_scalar(&sql).bind(name).fetch_one(&state.pool).await?;

    if count > 0 {
        return Err(AppError::conflict("name already in use"));
    }

    Ok(())
}

async fn delete_lookup_row(state: &AppState, table: &str, id: i64, missing: &str) -> AppResult<()> {
    let sql = format!("DELETE FROM {table} WHERE id = ?");
    let result = sqlx::query(&sql).bind(id).execute(&state.pool).await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(missing));
    }

    Ok(())
}
