//! Core types shared by the sales service crates.
//!
//! - **Roles**: the closed set of authorization roles carried in tokens
//! - **Identifiers**: per-request trace identifiers
//! - **Error types**: parse errors shared across crates
//!
//! # Example
//!
//! ```
//! use sales_core::{Role, TraceId};
//!
//! let role: Role = "ADMIN".parse().unwrap();
//! assert_eq!(role, Role::Admin);
//! assert!("ROOT".parse::<Role>().is_err());
//!
//! let trace_id = TraceId::generate();
//! assert_eq!(trace_id.to_string().len(), 36);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod role;

pub use error::{CoreError, Result};
pub use ids::TraceId;
pub use role::Role;
