use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::Loggable;

/// Coarse role tag stored on the account row. The fine-grained capability
/// set comes from the role/permission graph; this tag drives ownership
/// scoping and the one-profile-per-account rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RoleTag {
    Admin,
    Agent,
    Customer,
}

impl RoleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTag::Admin => "Admin",
            RoleTag::Agent => "Agent",
            RoleTag::Customer => "Customer",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            RoleTag::Admin => "admin",
            RoleTag::Agent => "agent",
            RoleTag::Customer => "customer",
        }
    }
}

impl std::str::FromStr for RoleTag {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Admin" => Ok(RoleTag::Admin),
            "Agent" => Ok(RoleTag::Agent),
            "Customer" => Ok(RoleTag::Customer),
            other => Err(AppError::internal(format!("unknown role tag: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: RoleTag,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> String { self.id.to_string() }
}

/// Raw account row; ids are stored as hyphenated uuid text.
#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: Uuid::parse_str(&value.id)
                .map_err(|err| AppError::internal(format!("invalid account id: {err}")))?,
            first_name: value.first_name,
            last_name: value.last_name,
            email: value.email,
            role: value.role.parse()?,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

/// Customer profile; at most one per account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub id: i64,
    pub account_id: Uuid,
    pub customer_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Agent profile; at most one per account, never alongside a customer profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Agent {
    pub id: i64,
    pub account_id: Uuid,
    pub agent_name: String,
    pub skillset: Option<String>,
    pub availability: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    pub last_name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Current account enriched with its resolved authorization snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}
