//! HTTP request handlers.

pub mod claims;
pub mod health;
pub mod metrics;
