#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use helpdesk::create_app;
use helpdesk::utils::hash_password;

// Fixed ids from the seed migration.
pub const ADMIN_ROLE_ID: &str = "a0000000-0000-4000-8000-000000000001";
pub const AGENT_ROLE_ID: &str = "a0000000-0000-4000-8000-000000000002";
pub const CUSTOMER_ROLE_ID: &str = "a0000000-0000-4000-8000-000000000003";
pub const VIEW_ALL_TICKETS_ID: &str = "b0000000-0000-4000-8000-000000000008";

pub const TEST_PASSWORD: &str = "password123";

/// Temp sqlite database with migrations applied, plus the app router.
pub async fn setup() -> Result<(Router, SqlitePool, TempDir)> {
    let dir = TempDir::new().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok((app, pool, dir))
}

/// Fire a request and return (status, parsed body). Empty bodies parse as null.
pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    let request = match payload {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
    };

    Ok((status, value))
}

/// Register a customer through the API; returns (token, account id).
pub async fn register_customer(app: &Router, first: &str, last: &str, email: &str) -> Result<(String, String)> {
    let (status, body) = request(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "first_name": first,
            "last_name": last,
            "email": email,
            "password": TEST_PASSWORD,
        })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "register failed: {status} - {body}");

    let token = body["token"].as_str().context("missing token")?.to_string();
    let account_id = body["user"]["id"].as_str().context("missing account id")?.to_string();
    Ok((token, account_id))
}

pub struct Staff {
    pub token: String,
    pub account_id: String,
    /// Agent profile id, for agent accounts.
    pub agent_id: Option<i64>,
}

/// Provision an admin or agent directly in the database (there is no staff
/// signup endpoint) and log in through the API.
pub async fn create_staff(pool: &SqlitePool, app: &Router, role: &str, email: &str) -> Result<Staff> {
    let account_id = Uuid::new_v4();
    let now = chrono::Utc::now();

    sqlx::query(
        "INSERT INTO accounts (id, first_name, last_name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(account_id.to_string())
    .bind("Test")
    .bind(role)
    .bind(email)
    .bind(hash_password(TEST_PASSWORD)?)
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query("INSERT INTO accounts_roles (account_id, role_id) SELECT ?, id FROM roles WHERE slug = ?")
        .bind(account_id.to_string())
        .bind(role.to_lowercase())
        .execute(pool)
        .await?;

    let agent_id = if role == "Agent" {
        let result = sqlx::query("INSERT INTO agents (account_id, agent_name) VALUES (?, ?)")
            .bind(account_id.to_string())
            .bind(format!("Test {role}"))
            .execute(pool)
            .await?;
        Some(result.last_insert_rowid())
    } else {
        None
    };

    let (status, body) = request(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": TEST_PASSWORD })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::OK, "staff login failed: {status} - {body}");

    Ok(Staff {
        token: body["token"].as_str().context("missing token")?.to_string(),
        account_id: account_id.to_string(),
        agent_id,
    })
}

/// File a ticket through the API and return its id.
pub async fn create_ticket(app: &Router, token: &str, subject: &str) -> Result<i64> {
    let (status, body) = request(
        app,
        "POST",
        "/tickets",
        Some(token),
        Some(json!({
            "subject": subject,
            "description": "integration test ticket",
            "department_id": 1,
            "priority_id": 3,
            "message": "opening message",
        })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "ticket create failed: {status} - {body}");

    body["id"].as_i64().context("missing ticket id")
}

/// Resolve a ticket's current status name straight from the database.
pub async fn ticket_status_name(pool: &SqlitePool, ticket_id: i64) -> Result<String> {
    let name: String = sqlx::query_scalar(
        "SELECT s.status_name FROM tickets t INNER JOIN ticket_status s ON s.id = t.status_id WHERE t.id = ?",
    )
    .bind(ticket_id)
    .fetch_one(pool)
    .await?;
    Ok(name)
}
