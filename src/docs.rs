//! OpenAPI document assembly and Swagger UI wiring.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::tickets::list_tickets,
        routes::tickets::list_assigned_tickets,
        routes::tickets::create_ticket,
        routes::tickets::get_ticket,
        routes::tickets::create_comment,
        routes::tickets::close_ticket,
        routes::tickets::assign_ticket,
        routes::tickets::delete_ticket,
        routes::tickets::get_attachment,
        routes::rbac::list_roles,
        routes::rbac::create_role,
        routes::rbac::get_role,
        routes::rbac::delete_role,
        routes::rbac::get_role_permissions,
        routes::rbac::assign_permission_to_role,
        routes::rbac::revoke_permission_from_role,
        routes::rbac::list_permissions,
        routes::rbac::create_permission,
        routes::rbac::get_account_roles,
        routes::rbac::assign_role_to_account,
        routes::rbac::revoke_role_from_account,
        routes::rbac::get_effective_permissions,
        routes::users::list_users,
        routes::users::delete_user,
        routes::users::list_agents,
        routes::users::list_customers,
        routes::lookups::list_departments,
        routes::lookups::create_department,
        routes::lookups::delete_department,
        routes::lookups::list_priorities,
        routes::lookups::create_priority,
        routes::lookups::delete_priority,
        routes::lookups::list_statuses,
        routes::lookups::create_status,
        routes::lookups::delete_status,
    ),
    components(
        schemas(
            models::user::RoleTag,
            models::user::User,
            models::user::Customer,
            models::user::Agent,
            models::user::RegisterRequest,
            models::user::LoginRequest,
            models::user::AuthResponse,
            models::user::MeResponse,
            models::rbac::Role,
            models::rbac::RoleCreateRequest,
            models::rbac::Permission,
            models::rbac::PermissionCreateRequest,
            models::rbac::AssignRoleRequest,
            models::rbac::AssignPermissionToRoleRequest,
            models::rbac::EffectivePermissions,
            models::rbac::EffectivePermission,
            models::ticket::Ticket,
            models::ticket::TicketSummary,
            models::ticket::TicketDetail,
            models::ticket::Comment,
            models::ticket::CommentWithAttachments,
            models::ticket::Attachment,
            models::ticket::AttachmentUpload,
            models::ticket::TicketCreateRequest,
            models::ticket::CommentCreateRequest,
            models::ticket::AssignTicketRequest,
            models::ticket::Department,
            models::ticket::TicketStatus,
            models::ticket::TicketPriority,
            models::ticket::DepartmentCreateRequest,
            models::ticket::StatusCreateRequest,
            models::ticket::PriorityCreateRequest,
            routes::health::HealthResponse,
            routes::auth::MessageResponse
        )
    ),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Tickets", description = "Ticket filing and tracking"),
        (name = "RBAC", description = "Role and permission administration"),
        (name = "Users", description = "Account and profile directory"),
        (name = "Lookups", description = "Departments, priorities and statuses"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;

    ensure_security_components(&mut doc);
    ensure_servers(&mut doc, port);

    Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(serde_json::to_value(&doc).expect("OpenAPI serialization must succeed"));

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json((*doc_json).clone()) }
        })
    };

    Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn ensure_security_components(doc: &mut Value) {
    let components = doc
        .as_object_mut()
        .expect("OpenAPI root must be an object")
        .entry("components")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .expect("components must be an object");

    let schemes = components
        .entry("securitySchemes")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .expect("securitySchemes must be an object");

    schemes.insert(
        "bearerAuth".to_string(),
        json!({
            "type": "http",
            "scheme": "bearer",
            "bearerFormat": "JWT"
        }),
    );
}

fn ensure_servers(doc: &mut Value, port: u16) {
    let server_url = format!("http://localhost:{port}");

    match doc.get_mut("servers") {
        Some(Value::Array(servers)) => {
            let present = servers
                .iter()
                .any(|entry| entry.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
            if !present {
                servers.push(json!({ "url": server_url }));
            }
        }
        _ => {
            doc["servers"] = json!([{ "url": server_url }]);
        }
    }
}
