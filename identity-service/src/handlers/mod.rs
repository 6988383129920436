//! HTTP handlers for identity-service.

pub mod auth;
pub mod organization;
pub mod user;
