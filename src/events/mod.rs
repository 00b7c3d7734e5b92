//! Audit event bus. Handlers emit domain events for entity mutations; a
//! background listener projects them into the activity_log table. RBAC
//! changes are recorded with Critical severity so permission history is
//! never trimmed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<String>,
    pub severity: Severity,
    pub payload: Value,
}

pub type EventBus = broadcast::Sender<DomainEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<DomainEvent>) {
    broadcast::channel(1024)
}

/// Emit an activity event for an entity mutation. Fire and forget: a full
/// or closed channel must never fail the request that triggered it.
pub fn log_activity<T: Loggable>(event_bus: &EventBus, action: &str, actor_id: Option<Uuid>, entity: &T) {
    let event = DomainEvent {
        id: Uuid::new_v4(),
        name: format!("{}.{}", T::entity_type(), action),
        occurred_at: Utc::now(),
        actor_id,
        subject_id: Some(entity.subject_id()),
        severity: entity.severity(),
        payload: serde_json::to_value(entity).unwrap_or_default(),
    };

    let _ = event_bus.send(event);
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<DomainEvent>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    while let Ok(event) = rx.recv().await {
        let description = describe(&event.name);
        let properties = serde_json::to_string(&event.payload).unwrap_or_default();

        let result = sqlx::query(
            r#"
            INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, properties, severity)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&event.name)
        .bind(description)
        .bind(event.actor_id.map(|id| id.to_string()))
        .bind(&event.subject_id)
        .bind(event.occurred_at)
        .bind(&properties)
        .bind(event.severity.as_str())
        .execute(&pool)
        .await;

        if let Err(e) = result {
            tracing::error!("failed to save activity log: {}", e);
        }
    }
}

fn describe(event_name: &str) -> &'static str {
    match event_name {
        "ticket.created" => "Ticket created",
        "ticket.updated" => "Ticket updated",
        "ticket.assigned" => "Ticket assigned",
        "ticket.deleted" => "Ticket deleted",
        "comment.created" => "Comment posted",
        "user.registered" => "New user registered",
        "user.deleted" => "User deleted",
        "role.created" => "Role created",
        "role.deleted" => "Role deleted",
        "permission.created" => "Permission created",
        "account_role.assigned" => "Role assigned to account",
        "account_role.revoked" => "Role revoked from account",
        "role_permission.assigned" => "Permission assigned to role",
        "role_permission.revoked" => "Permission revoked from role",
        "department.created" => "Department created",
        "department.deleted" => "Department deleted",
        _ => "System event",
    }
}
