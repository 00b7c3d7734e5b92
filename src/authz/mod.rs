//! Authorization core: role/permission gate and ticket ownership scoping.
//!
//! Every protected handler extracts a [`Principal`] (the authenticated
//! account with its role and effective permission slugs, resolved fresh per
//! request) and runs it through [`authorize`] and, for ticket access,
//! [`TicketScope`]. Denials carry a reason for the logs; the HTTP layer only
//! ever surfaces a generic forbidden response, and out-of-scope detail
//! fetches surface as not-found.

mod principal;
mod scope;

pub use principal::{effective_permissions, Principal};
pub use scope::TicketScope;

use crate::errors::{AppError, AppResult};

/// Well-known role slugs seeded at setup time.
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const AGENT: &str = "agent";
    pub const CUSTOMER: &str = "customer";
}

/// Well-known permission slugs seeded at setup time.
pub mod permissions {
    // User management
    pub const MANAGE_USERS: &str = "manage_users";
    pub const VIEW_USERS: &str = "view_users";
    pub const IMPERSONATE_USER: &str = "impersonate_user";
    pub const DELETE_USERS: &str = "delete_users";
    pub const VIEW_AGENTS: &str = "view_agents";
    pub const VIEW_CUSTOMERS: &str = "view_customers";

    // Ticket management
    pub const MANAGE_TICKETS: &str = "manage_tickets";
    pub const VIEW_ALL_TICKETS: &str = "view_all_tickets";
    pub const VIEW_ASSIGNED_TICKETS: &str = "view_assigned_tickets";
    pub const CREATE_TICKETS: &str = "create_tickets";
    pub const COMMENT_TICKETS: &str = "comment_tickets";
    pub const ASSIGN_TICKETS: &str = "assign_tickets";
    pub const CHANGE_STATUS: &str = "change_status";
    pub const DELETE_TICKETS: &str = "delete_tickets";

    // Resources & config
    pub const DOWNLOAD_ATTACHMENTS: &str = "download_attachments";
    pub const MANAGE_DEPARTMENTS: &str = "manage_departments";
    pub const MANAGE_PRIORITIES: &str = "manage_priorities";
    pub const MANAGE_STATUSES: &str = "manage_statuses";

    // Analytics
    pub const VIEW_REPORTS: &str = "view_reports";
}

/// Outcome of an authorization check. `Deny` never escalates to an error on
/// its own; callers decide how the denial surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert a denial into the generic 403 error, logging the reason.
    pub fn require(self) -> AppResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AppError::forbidden(reason)),
        }
    }
}

/// Gate rule: allow iff (`required_roles` is empty OR the principal holds one
/// of them) AND (`required_permissions` is empty OR all of them are in the
/// principal's effective set). Call sites may pass either list alone; both
/// combine with AND when present.
pub fn authorize(principal: &Principal, required_roles: &[&str], required_permissions: &[&str]) -> Decision {
    if !required_roles.is_empty() && !required_roles.iter().any(|role| principal.has_role(role)) {
        return Decision::Deny(format!(
            "account {} lacks required role (one of {:?})",
            principal.account_id, required_roles
        ));
    }

    if let Some(missing) = required_permissions
        .iter()
        .find(|perm| !principal.has_permission(perm))
    {
        return Decision::Deny(format!(
            "account {} lacks permission '{}'",
            principal.account_id, missing
        ));
    }

    Decision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn customer_principal() -> Principal {
        Principal::new(Uuid::new_v4(), crate::models::user::RoleTag::Customer)
            .with_permissions([permissions::CREATE_TICKETS, permissions::COMMENT_TICKETS])
    }

    #[test]
    fn empty_constraints_allow_any_authenticated_account() {
        let principal = customer_principal();
        assert!(authorize(&principal, &[], &[]).is_allowed());
    }

    #[test]
    fn role_only_check() {
        let principal = customer_principal();
        assert!(authorize(&principal, &[roles::CUSTOMER], &[]).is_allowed());
        assert!(!authorize(&principal, &[roles::ADMIN], &[]).is_allowed());
        // Any of several roles is enough.
        assert!(authorize(&principal, &[roles::ADMIN, roles::CUSTOMER], &[]).is_allowed());
    }

    #[test]
    fn permission_only_check() {
        let principal = customer_principal();
        assert!(authorize(&principal, &[], &[permissions::CREATE_TICKETS]).is_allowed());
        assert!(!authorize(&principal, &[], &[permissions::DELETE_TICKETS]).is_allowed());
    }

    #[test]
    fn role_and_permission_combine_with_and() {
        let principal = customer_principal();
        assert!(authorize(&principal, &[roles::CUSTOMER], &[permissions::COMMENT_TICKETS]).is_allowed());
        assert!(!authorize(&principal, &[roles::AGENT], &[permissions::COMMENT_TICKETS]).is_allowed());
        assert!(!authorize(&principal, &[roles::CUSTOMER], &[permissions::ASSIGN_TICKETS]).is_allowed());
    }

    #[test]
    fn all_required_permissions_must_be_held() {
        let principal = customer_principal();
        let both = [permissions::CREATE_TICKETS, permissions::COMMENT_TICKETS];
        assert!(authorize(&principal, &[], &both).is_allowed());

        let one_missing = [permissions::CREATE_TICKETS, permissions::CHANGE_STATUS];
        match authorize(&principal, &[], &one_missing) {
            Decision::Deny(reason) => assert!(reason.contains("change_status")),
            Decision::Allow => panic!("expected denial"),
        }
    }

    #[test]
    fn denial_carries_reason_but_never_panics() {
        let principal = customer_principal();
        let decision = authorize(&principal, &[], &["no_such_permission"]);
        assert!(!decision.is_allowed());
        assert!(decision.require().is_err());
    }
}
