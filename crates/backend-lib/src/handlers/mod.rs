//! HTTP handlers.

pub mod users;

pub use users::{health, list_users, login, me, register, unlock_user, update_user, JsonBody};
