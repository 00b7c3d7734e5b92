//! Ticket endpoints. Every handler resolves a [`Principal`] and runs the
//! permission gate, then narrows row access through a [`TicketScope`]. A
//! ticket outside the caller's scope is reported as not-found, never as
//! forbidden.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{authorize, permissions, Principal, TicketScope};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::ticket::{
    AssignTicketRequest, Attachment, AttachmentUpload, Comment, CommentCreateRequest, CommentWithAttachments,
    Ticket, TicketCreateRequest, TicketDetail, TicketListQuery, TicketSummary,
};
use crate::models::user::RoleTag;
use crate::utils::utc_now;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

const STATUS_OPEN: &str = "Open";
const STATUS_CLOSED: &str = "Closed";

#[utoipa::path(
    get,
    path = "/tickets",
    tag = "Tickets",
    params(
        ("page" = Option<u32>, Query, description = "1-based page number"),
        ("per_page" = Option<u32>, Query, description = "Page size, capped at 100"),
        ("search" = Option<String>, Query, description = "Matches subject and description"),
        ("status" = Option<String>, Query, description = "Status name filter"),
        ("department" = Option<String>, Query, description = "Department name filter"),
    ),
    responses((status = 200, description = "Tickets visible to the caller", body = Vec<TicketSummary>)),
    security(("bearerAuth" = []))
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<TicketListQuery>,
) -> AppResult<Json<Vec<TicketSummary>>> {
    let scope = TicketScope::for_principal(&principal);

    let mut sql = String::from(
        r#"
        SELECT t.id, t.customer_id, t.subject, t.assigned_to,
               s.status_name AS status_name, p.priority_name AS priority_name,
               d.department_name AS department_name,
               t.created_at, t.updated_at
        FROM tickets t
        LEFT JOIN ticket_status s ON s.id = t.status_id
        LEFT JOIN ticket_priority p ON p.id = t.priority_id
        LEFT JOIN departments d ON d.id = t.department_id
        WHERE t.deleted_at IS NULL
        "#,
    );
    sql.push_str(scope.where_sql());
    if query.search.is_some() {
        sql.push_str(" AND (t.subject LIKE ? OR t.description LIKE ?)");
    }
    if query.status.is_some() {
        sql.push_str(" AND s.status_name = ?");
    }
    if query.department.is_some() {
        sql.push_str(" AND d.department_name = ?");
    }
    sql.push_str(" ORDER BY t.created_at DESC, t.id DESC LIMIT ? OFFSET ?");

    // i64 arithmetic: an extreme page number must not overflow, just
    // produce an offset past the end of the result set.
    let per_page = i64::from(query.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE));
    let page = i64::from(query.page.unwrap_or(1).max(1));
    let offset = (page - 1) * per_page;

    let mut db_query = sqlx::query_as::<_, TicketSummary>(&sql);
    if let Some(owner_id) = scope.bind_id() {
        db_query = db_query.bind(owner_id);
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{search}%");
        db_query = db_query.bind(pattern.clone()).bind(pattern);
    }
    if let Some(status) = &query.status {
        db_query = db_query.bind(status);
    }
    if let Some(department) = &query.department {
        db_query = db_query.bind(department);
    }

    let tickets = db_query
        .bind(per_page)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(tickets))
}

#[utoipa::path(
    get,
    path = "/tickets/assigned",
    tag = "Tickets",
    responses(
        (status = 200, description = "Tickets assigned to the calling agent", body = Vec<TicketSummary>),
        (status = 403, description = "Caller may not view assigned tickets")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_assigned_tickets(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<TicketSummary>>> {
    authorize(&principal, &[], &[permissions::VIEW_ASSIGNED_TICKETS]).require()?;

    let agent_id = principal
        .agent_id
        .ok_or_else(|| AppError::forbidden(format!("account {} has no agent profile", principal.account_id)))?;

    let tickets = sqlx::query_as::<_, TicketSummary>(
        r#"
        SELECT t.id, t.customer_id, t.subject, t.assigned_to,
               s.status_name AS status_name, p.priority_name AS priority_name,
               d.department_name AS department_name,
               t.created_at, t.updated_at
        FROM tickets t
        LEFT JOIN ticket_status s ON s.id = t.status_id
        LEFT JOIN ticket_priority p ON p.id = t.priority_id
        LEFT JOIN departments d ON d.id = t.department_id
        WHERE t.deleted_at IS NULL AND t.assigned_to = ?
        ORDER BY t.created_at DESC, t.id DESC
        "#,
    )
    .bind(agent_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(tickets))
}

#[utoipa::path(
    post,
    path = "/tickets",
    tag = "Tickets",
    request_body = TicketCreateRequest,
    responses(
        (status = 201, description = "Ticket created", body = TicketDetail),
        (status = 400, description = "Invalid references in payload"),
        (status = 403, description = "Caller may not create tickets")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_ticket(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<TicketCreateRequest>,
) -> AppResult<(StatusCode, Json<TicketDetail>)> {
    authorize(&principal, &[], &[permissions::CREATE_TICKETS]).require()?;

    // Customers always own what they file; staff must name the customer.
    let customer_id = match principal.role {
        RoleTag::Customer => principal
            .customer_id
            .ok_or_else(|| AppError::forbidden(format!("account {} has no customer profile", principal.account_id)))?,
        RoleTag::Admin | RoleTag::Agent => {
            let target = payload
                .customer_id
                .ok_or_else(|| AppError::bad_request("customer_id is required"))?;
            ensure_exists(&state.pool, "customers", target, "unknown customer").await?;
            target
        }
    };

    ensure_exists(&state.pool, "departments", payload.department_id, "unknown department").await?;
    ensure_exists(&state.pool, "ticket_priority", payload.priority_id, "unknown priority").await?;

    // An agent filing without an explicit assignee picks the ticket up.
    let assigned_to = match payload.assigned_to {
        Some(agent_id) => {
            ensure_exists(&state.pool, "agents", agent_id, "unknown agent").await?;
            Some(agent_id)
        }
        None => principal.agent_id,
    };

    let status_id = status_id_by_name(&state.pool, STATUS_OPEN).await?;
    let now = utc_now();

    let result = sqlx::query(
        r#"
        INSERT INTO tickets (customer_id, subject, description, status_id, priority_id, assigned_to, department_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(customer_id)
    .bind(&payload.subject)
    .bind(&payload.description)
    .bind(status_id)
    .bind(payload.priority_id)
    .bind(assigned_to)
    .bind(payload.department_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let ticket_id = result.last_insert_rowid();

    insert_comment(
        &state.pool,
        ticket_id,
        principal.role,
        None,
        &payload.message,
        &payload.attachments,
    )
    .await?;

    let detail = load_ticket_detail(&state.pool, ticket_id, TicketScope::Unrestricted).await?;
    log_activity(&state.event_bus, "created", Some(principal.account_id), &detail.ticket);

    Ok((StatusCode::CREATED, Json(detail)))
}

#[utoipa::path(
    get,
    path = "/tickets/{id}",
    tag = "Tickets",
    params(("id" = i64, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket with comment thread", body = TicketDetail),
        (status = 404, description = "Ticket not found or outside the caller's scope")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_ticket(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<i64>,
) -> AppResult<Json<TicketDetail>> {
    let scope = TicketScope::for_principal(&principal);
    let detail = load_ticket_detail(&state.pool, ticket_id, scope).await?;
    Ok(Json(detail))
}

#[utoipa::path(
    post,
    path = "/tickets/{id}/comments",
    tag = "Tickets",
    params(("id" = i64, Path, description = "Ticket ID")),
    request_body = CommentCreateRequest,
    responses(
        (status = 201, description = "Comment posted", body = Comment),
        (status = 403, description = "Caller may not comment"),
        (status = 404, description = "Ticket not found or outside the caller's scope")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_comment(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<i64>,
    Json(payload): Json<CommentCreateRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    authorize(&principal, &[], &[permissions::COMMENT_TICKETS]).require()?;

    let scope = TicketScope::for_principal(&principal);
    let ticket = fetch_ticket_in_scope(&state.pool, ticket_id, scope).await?;

    if let Some(parent_id) = payload.parent_comment_id {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM ticket_comments WHERE id = ? AND ticket_id = ?")
                .bind(parent_id)
                .bind(ticket_id)
                .fetch_one(&state.pool)
                .await?;
        if count == 0 {
            return Err(AppError::bad_request("parent comment does not belong to this ticket"));
        }
    }

    let comment_id = insert_comment(
        &state.pool,
        ticket_id,
        principal.role,
        payload.parent_comment_id,
        &payload.message,
        &payload.attachments,
    )
    .await?;

    // A customer replying to a closed ticket reopens it.
    let now = utc_now();
    if principal.role == RoleTag::Customer && status_name(&state.pool, ticket.status_id).await?.as_deref() == Some(STATUS_CLOSED)
    {
        let open_id = status_id_by_name(&state.pool, STATUS_OPEN).await?;
        sqlx::query("UPDATE tickets SET status_id = ?, updated_at = ? WHERE id = ?")
            .bind(open_id)
            .bind(now)
            .bind(ticket_id)
            .execute(&state.pool)
            .await?;
    } else {
        sqlx::query("UPDATE tickets SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(ticket_id)
            .execute(&state.pool)
            .await?;
    }

    let comment = sqlx::query_as::<_, Comment>(
        "SELECT id, ticket_id, author_role, parent_comment_id, message, created_at FROM ticket_comments WHERE id = ?",
    )
    .bind(comment_id)
    .fetch_one(&state.pool)
    .await?;

    log_activity(&state.event_bus, "created", Some(principal.account_id), &comment);

    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    post,
    path = "/tickets/{id}/close",
    tag = "Tickets",
    params(("id" = i64, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket closed", body = Ticket),
        (status = 403, description = "Caller may not change status"),
        (status = 404, description = "Ticket not found or outside the caller's scope")
    ),
    security(("bearerAuth" = []))
)]
pub async fn close_ticket(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<i64>,
) -> AppResult<Json<Ticket>> {
    authorize(&principal, &[], &[permissions::CHANGE_STATUS]).require()?;

    let scope = TicketScope::for_principal(&principal);
    fetch_ticket_in_scope(&state.pool, ticket_id, scope).await?;

    let closed_id = status_id_by_name(&state.pool, STATUS_CLOSED).await?;
    sqlx::query("UPDATE tickets SET status_id = ?, updated_at = ? WHERE id = ?")
        .bind(closed_id)
        .bind(utc_now())
        .bind(ticket_id)
        .execute(&state.pool)
        .await?;

    let ticket = fetch_ticket_in_scope(&state.pool, ticket_id, TicketScope::Unrestricted).await?;
    log_activity(&state.event_bus, "updated", Some(principal.account_id), &ticket);

    Ok(Json(ticket))
}

#[utoipa::path(
    post,
    path = "/tickets/{id}/assign",
    tag = "Tickets",
    params(("id" = i64, Path, description = "Ticket ID")),
    request_body = AssignTicketRequest,
    responses(
        (status = 200, description = "Ticket assigned", body = Ticket),
        (status = 400, description = "Unknown agent"),
        (status = 403, description = "Caller may not assign tickets"),
        (status = 404, description = "Ticket not found or outside the caller's scope")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_ticket(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<i64>,
    Json(payload): Json<AssignTicketRequest>,
) -> AppResult<Json<Ticket>> {
    authorize(&principal, &[], &[permissions::ASSIGN_TICKETS]).require()?;

    let scope = TicketScope::for_principal(&principal);
    fetch_ticket_in_scope(&state.pool, ticket_id, scope).await?;

    ensure_exists(&state.pool, "agents", payload.agent_id, "unknown agent").await?;

    sqlx::query("UPDATE tickets SET assigned_to = ?, updated_at = ? WHERE id = ?")
        .bind(payload.agent_id)
        .bind(utc_now())
        .bind(ticket_id)
        .execute(&state.pool)
        .await?;

    let ticket = fetch_ticket_in_scope(&state.pool, ticket_id, TicketScope::Unrestricted).await?;
    log_activity(&state.event_bus, "assigned", Some(principal.account_id), &ticket);

    Ok(Json(ticket))
}

#[utoipa::path(
    delete,
    path = "/tickets/{id}",
    tag = "Tickets",
    params(("id" = i64, Path, description = "Ticket ID")),
    responses(
        (status = 204, description = "Ticket deleted"),
        (status = 403, description = "Caller may not delete tickets"),
        (status = 404, description = "Ticket not found or outside the caller's scope")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_ticket(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<i64>,
) -> AppResult<StatusCode> {
    authorize(&principal, &[], &[permissions::DELETE_TICKETS]).require()?;

    let scope = TicketScope::for_principal(&principal);
    let ticket = fetch_ticket_in_scope(&state.pool, ticket_id, scope).await?;

    // Soft delete; the row stays for the audit trail.
    sqlx::query("UPDATE tickets SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(utc_now())
        .bind(ticket_id)
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "deleted", Some(principal.account_id), &ticket);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/tickets/{id}/attachments/{attachment_id}",
    tag = "Tickets",
    params(
        ("id" = i64, Path, description = "Ticket ID"),
        ("attachment_id" = i64, Path, description = "Attachment ID"),
    ),
    responses(
        (status = 200, description = "Attachment metadata", body = Attachment),
        (status = 403, description = "Caller may not download attachments"),
        (status = 404, description = "Attachment not found or outside the caller's scope")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_attachment(
    State(state): State<AppState>,
    principal: Principal,
    Path((ticket_id, attachment_id)): Path<(i64, i64)>,
) -> AppResult<Json<Attachment>> {
    authorize(&principal, &[], &[permissions::DOWNLOAD_ATTACHMENTS]).require()?;

    let scope = TicketScope::for_principal(&principal);
    fetch_ticket_in_scope(&state.pool, ticket_id, scope).await?;

    let attachment = sqlx::query_as::<_, Attachment>(
        r#"
        SELECT a.id, a.comment_id, a.file_name, a.file_path, a.uploaded_at
        FROM ticket_attachments a
        INNER JOIN ticket_comments c ON a.comment_id = c.id
        WHERE a.id = ? AND c.ticket_id = ?
        "#,
    )
    .bind(attachment_id)
    .bind(ticket_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("attachment not found"))?;

    Ok(Json(attachment))
}

// =============================================================================
// HELPERS
// =============================================================================

/// Fetch a live ticket, narrowed by the caller's scope. Out-of-scope rows are
/// indistinguishable from missing ones.
async fn fetch_ticket_in_scope(pool: &SqlitePool, ticket_id: i64, scope: TicketScope) -> AppResult<Ticket> {
    let sql = format!(
        "SELECT id, customer_id, subject, description, status_id, priority_id, assigned_to, department_id, created_at, updated_at, deleted_at FROM tickets WHERE id = ? AND deleted_at IS NULL{}",
        scope.where_sql()
    );

    let mut query = sqlx::query_as::<_, Ticket>(&sql).bind(ticket_id);
    if let Some(owner_id) = scope.bind_id() {
        query = query.bind(owner_id);
    }

    query
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("ticket not found"))
}

async fn load_ticket_detail(pool: &SqlitePool, ticket_id: i64, scope: TicketScope) -> AppResult<TicketDetail> {
    let ticket = fetch_ticket_in_scope(pool, ticket_id, scope).await?;

    let comments = sqlx::query_as::<_, Comment>(
        "SELECT id, ticket_id, author_role, parent_comment_id, message, created_at FROM ticket_comments WHERE ticket_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(ticket_id)
    .fetch_all(pool)
    .await?;

    let attachments = sqlx::query_as::<_, Attachment>(
        r#"
        SELECT a.id, a.comment_id, a.file_name, a.file_path, a.uploaded_at
        FROM ticket_attachments a
        INNER JOIN ticket_comments c ON a.comment_id = c.id
        WHERE c.ticket_id = ?
        ORDER BY a.id
        "#,
    )
    .bind(ticket_id)
    .fetch_all(pool)
    .await?;

    let mut by_comment: HashMap<i64, Vec<Attachment>> = HashMap::new();
    for attachment in attachments {
        by_comment.entry(attachment.comment_id).or_default().push(attachment);
    }

    let comments = comments
        .into_iter()
        .map(|comment| {
            let attachments = by_comment.remove(&comment.id).unwrap_or_default();
            CommentWithAttachments { comment, attachments }
        })
        .collect();

    Ok(TicketDetail { ticket, comments })
}

async fn insert_comment(
    pool: &SqlitePool,
    ticket_id: i64,
    author_role: RoleTag,
    parent_comment_id: Option<i64>,
    message: &str,
    attachments: &[AttachmentUpload],
) -> AppResult<i64> {
    let now = utc_now();

    let result = sqlx::query(
        "INSERT INTO ticket_comments (ticket_id, author_role, parent_comment_id, message, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(ticket_id)
    .bind(author_role.as_str())
    .bind(parent_comment_id)
    .bind(message)
    .bind(now)
    .execute(pool)
    .await?;

    let comment_id = result.last_insert_rowid();

    for upload in attachments {
        sqlx::query(
            "INSERT INTO ticket_attachments (comment_id, file_name, file_path, uploaded_at) VALUES (?, ?, ?, ?)",
        )
        .bind(comment_id)
        .bind(&upload.file_name)
        .bind(&upload.file_path)
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(comment_id)
}

async fn status_id_by_name(pool: &SqlitePool, name: &str) -> AppResult<i64> {
    sqlx::query_scalar("SELECT id FROM ticket_status WHERE status_name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::internal(format!("missing '{name}' status row")))
}

async fn status_name(pool: &SqlitePool, status_id: Option<i64>) -> AppResult<Option<String>> {
    let Some(status_id) = status_id else {
        return Ok(None);
    };

    let name = sqlx::query_scalar("SELECT status_name FROM ticket_status WHERE id = ?")
        .bind(status_id)
        .fetch_optional(pool)
        .await?;

    Ok(name)
}

/// Existence check for an integer-keyed reference table.
async fn ensure_exists(pool: &SqlitePool, table: &str, id: i64, message: &str) -> AppResult<()> {
    let sql = format!("SELECT COUNT(1) FROM {table} WHERE id = ?");
    let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(pool).await?;

    if count == 0 {
        return Err(AppError::bad_request(message));
    }

    Ok(())
}
