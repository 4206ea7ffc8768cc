pub mod admin;
pub mod health;
pub mod session_limit;
pub mod sessions;
