pub mod api;
pub mod events;
pub mod models;

/// Platform-assigned user identity. Immutable for the lifetime of a user.
pub type UserId = i64;
