use super::{permissions, Principal};
use crate::models::user::RoleTag;

/// Row-level ownership filter for ticket queries.
///
/// Applied by the data-access layer before any list or detail fetch. A detail
/// fetch that resolves outside the scope is reported as not-found, so callers
/// cannot probe for the existence of other people's tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    /// No restriction: admins and holders of `view_all_tickets`.
    Unrestricted,
    /// Tickets owned by this customer profile.
    Customer(i64),
    /// Tickets assigned to this agent profile.
    Agent(i64),
    /// Matches nothing; accounts without a resolvable profile.
    Nothing,
}

impl TicketScope {
    pub fn for_principal(principal: &Principal) -> Self {
        if principal.is_admin() || principal.has_permission(permissions::VIEW_ALL_TICKETS) {
            return TicketScope::Unrestricted;
        }

        match principal.role {
            RoleTag::Admin => TicketScope::Unrestricted,
            RoleTag::Customer => principal
                .customer_id
                .map_or(TicketScope::Nothing, TicketScope::Customer),
            RoleTag::Agent => principal
                .agent_id
                .map_or(TicketScope::Nothing, TicketScope::Agent),
        }
    }

    /// Row predicate: does a ticket with these ownership fields fall inside
    /// the scope?
    pub fn allows(&self, customer_id: Option<i64>, assigned_to: Option<i64>) -> bool {
        match *self {
            TicketScope::Unrestricted => true,
            TicketScope::Customer(own) => customer_id == Some(own),
            TicketScope::Agent(own) => assigned_to == Some(own),
            TicketScope::Nothing => false,
        }
    }

    /// SQL fragment appended to ticket queries; pair with [`Self::bind_id`].
    pub fn where_sql(&self) -> &'static str {
        match self {
            TicketScope::Unrestricted => "",
            TicketScope::Customer(_) => " AND customer_id = ?",
            TicketScope::Agent(_) => " AND assigned_to = ?",
            TicketScope::Nothing => " AND 1 = 0",
        }
    }

    pub fn bind_id(&self) -> Option<i64> {
        match *self {
            TicketScope::Customer(id) | TicketScope::Agent(id) => Some(id),
            TicketScope::Unrestricted | TicketScope::Nothing => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::roles;
    use uuid::Uuid;

    #[test]
    fn admin_is_unrestricted() {
        let principal = Principal::new(Uuid::new_v4(), RoleTag::Admin).with_roles([roles::ADMIN]);
        assert_eq!(TicketScope::for_principal(&principal), TicketScope::Unrestricted);
    }

    #[test]
    fn view_all_permission_is_unrestricted_for_any_role() {
        let principal = Principal::new(Uuid::new_v4(), RoleTag::Agent)
            .with_agent_id(7)
            .with_permissions([permissions::VIEW_ALL_TICKETS]);
        assert_eq!(TicketScope::for_principal(&principal), TicketScope::Unrestricted);
    }

    #[test]
    fn customer_is_limited_to_own_tickets() {
        let principal = Principal::new(Uuid::new_v4(), RoleTag::Customer).with_customer_id(42);
        let scope = TicketScope::for_principal(&principal);
        assert_eq!(scope, TicketScope::Customer(42));

        assert!(scope.allows(Some(42), None));
        assert!(!scope.allows(Some(41), None));
        // Ownerless tickets (transitional state) stay invisible.
        assert!(!scope.allows(None, Some(42)));
    }

    #[test]
    fn agent_without_view_all_sees_only_assigned() {
        let principal = Principal::new(Uuid::new_v4(), RoleTag::Agent)
            .with_agent_id(3)
            .with_permissions([permissions::VIEW_ASSIGNED_TICKETS]);
        let scope = TicketScope::for_principal(&principal);
        assert_eq!(scope, TicketScope::Agent(3));

        assert!(scope.allows(Some(1), Some(3)));
        assert!(!scope.allows(Some(1), Some(4)));
        assert!(!scope.allows(Some(1), None));
    }

    #[test]
    fn missing_profile_matches_nothing() {
        let principal = Principal::new(Uuid::new_v4(), RoleTag::Customer);
        let scope = TicketScope::for_principal(&principal);
        assert_eq!(scope, TicketScope::Nothing);
        assert!(!scope.allows(Some(1), Some(1)));
        assert_eq!(scope.where_sql(), " AND 1 = 0");
    }

    #[test]
    fn sql_fragments_carry_matching_binds() {
        assert_eq!(TicketScope::Unrestricted.where_sql(), "");
        assert_eq!(TicketScope::Unrestricted.bind_id(), None);
        assert_eq!(TicketScope::Customer(5).where_sql(), " AND customer_id = ?");
        assert_eq!(TicketScope::Customer(5).bind_id(), Some(5));
        assert_eq!(TicketScope::Agent(9).where_sql(), " AND assigned_to = ?");
        assert_eq!(TicketScope::Agent(9).bind_id(), Some(9));
    }
}
