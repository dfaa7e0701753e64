// src/middleware/mod.rs

pub mod admin_auth;
pub mod request_id;

pub use admin_auth::admin_auth_middleware;
pub use request_id::trace_requests;
