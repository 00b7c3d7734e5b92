pub mod auth;
pub mod health;
pub mod lookups;
pub mod rbac;
pub mod tickets;
pub mod users;
