pub mod auth;
pub mod files;
pub mod rate_limits;
