use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Loggable for Role {
    fn entity_type() -> &'static str { "role" }
    fn subject_id(&self) -> String { self.id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "Supervisor")]
    pub name: String,
    #[schema(example = "supervisor")]
    pub slug: String,
    #[schema(example = "Reviews escalated tickets")]
    pub description: Option<String>,
}

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

impl Loggable for Permission {
    fn entity_type() -> &'static str { "permission" }
    fn subject_id(&self) -> String { self.id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionCreateRequest {
    #[schema(example = "Escalate Tickets")]
    pub name: String,
    #[schema(example = "escalate_tickets")]
    pub slug: String,
}

// =============================================================================
// PIVOT EDGES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountRole {
    pub account_id: Uuid,
    pub role_id: Uuid,
}

impl Loggable for AccountRole {
    fn entity_type() -> &'static str { "account_role" }
    fn subject_id(&self) -> String { self.account_id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

impl Loggable for RolePermission {
    fn entity_type() -> &'static str { "role_permission" }
    fn subject_id(&self) -> String { self.role_id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPermissionToRoleRequest {
    pub permission_id: Uuid,
}

// =============================================================================
// EFFECTIVE PERMISSIONS (computed)
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissions {
    pub account_id: Uuid,
    pub roles: Vec<String>,
    pub permissions: Vec<EffectivePermission>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermission {
    pub slug: String,
    pub name: String,
    /// Role that contributes this permission.
    pub role_slug: String,
}
