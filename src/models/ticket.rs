use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Ticket {
    pub id: i64,
    /// Owning customer profile; nullable during transitional states.
    pub customer_id: Option<i64>,
    pub subject: String,
    pub description: Option<String>,
    pub status_id: Option<i64>,
    pub priority_id: Option<i64>,
    /// Assigned agent profile, if any.
    pub assigned_to: Option<i64>,
    pub department_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loggable for Ticket {
    fn entity_type() -> &'static str { "ticket" }
    fn subject_id(&self) -> String { self.id.to_string() }
}

/// Ticket row with lookup names resolved, used in listings.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct TicketSummary {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub subject: String,
    pub assigned_to: Option<i64>,
    pub status_name: Option<String>,
    pub priority_name: Option<String>,
    pub department_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub comments: Vec<CommentWithAttachments>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Comment {
    pub id: i64,
    pub ticket_id: i64,
    /// Author's role tag captured at post time.
    pub author_role: String,
    pub parent_comment_id: Option<i64>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Loggable for Comment {
    fn entity_type() -> &'static str { "comment" }
    fn subject_id(&self) -> String { self.id.to_string() }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentWithAttachments {
    #[serde(flatten)]
    pub comment: Comment,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Attachment {
    pub id: i64,
    pub comment_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub uploaded_at: DateTime<Utc>,
}

// =============================================================================
// LOOKUP TABLES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Department {
    pub id: i64,
    pub department_name: String,
}

impl Loggable for Department {
    fn entity_type() -> &'static str { "department" }
    fn subject_id(&self) -> String { self.id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TicketStatus {
    pub id: i64,
    pub status_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TicketPriority {
    pub id: i64,
    pub priority_name: String,
}

// =============================================================================
// REQUEST / QUERY TYPES
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct TicketCreateRequest {
    #[schema(example = "Cannot login to account")]
    pub subject: String,
    #[schema(example = "Forgot password link not working")]
    pub description: Option<String>,
    pub department_id: i64,
    pub priority_id: i64,
    /// Required when an admin or agent files on behalf of a customer;
    /// ignored for customers, who always own what they create.
    pub customer_id: Option<i64>,
    pub assigned_to: Option<i64>,
    /// Initial comment posted with the ticket.
    #[schema(example = "I am unable to login with my credentials.")]
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentCreateRequest {
    #[schema(example = "Still getting the 404 error.")]
    pub message: String,
    pub parent_comment_id: Option<i64>,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

/// Attachment metadata; physical file storage is out of scope.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AttachmentUpload {
    #[schema(example = "screenshot1.png")]
    pub file_name: String,
    #[schema(example = "/uploads/screenshot1.png")]
    pub file_path: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTicketRequest {
    pub agent_id: i64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TicketListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches against subject and description.
    pub search: Option<String>,
    /// Status name, e.g. "Open".
    pub status: Option<String>,
    /// Department name, e.g. "Technical".
    pub department: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepartmentCreateRequest {
    #[schema(example = "Technical")]
    pub department_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusCreateRequest {
    #[schema(example = "Escalated")]
    pub status_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PriorityCreateRequest {
    #[schema(example = "Blocker")]
    pub priority_name: String,
}
