use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{auth, health, lookups, rbac, tickets, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;

    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let ticket_routes = Router::new()
        .route("/", get(tickets::list_tickets).post(tickets::create_ticket))
        .route("/assigned", get(tickets::list_assigned_tickets))
        .route("/:id", get(tickets::get_ticket).delete(tickets::delete_ticket))
        .route("/:id/comments", post(tickets::create_comment))
        .route("/:id/close", post(tickets::close_ticket))
        .route("/:id/assign", post(tickets::assign_ticket))
        .route("/:id/attachments/:attachment_id", get(tickets::get_attachment));

    let user_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/:id", delete(users::delete_user))
        .route("/agents", get(users::list_agents))
        .route("/customers", get(users::list_customers));

    let lookup_routes = Router::new()
        .route("/departments", get(lookups::list_departments).post(lookups::create_department))
        .route("/departments/:id", delete(lookups::delete_department))
        .route("/priorities", get(lookups::list_priorities).post(lookups::create_priority))
        .route("/priorities/:id", delete(lookups::delete_priority))
        .route("/statuses", get(lookups::list_statuses).post(lookups::create_status))
        .route("/statuses/:id", delete(lookups::delete_status));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/tickets", ticket_routes)
        .nest("/rbac", rbac::routes())
        .merge(user_routes)
        .merge(lookup_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
