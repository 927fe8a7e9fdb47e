//! ContentSyndicate dashboard API
//!
//! Typed HTTP access to the backend plus the cache keys, bindings, and
//! mutations the dashboard builds on top of [`crate::query`].

mod client;
pub mod keys;
pub mod queries;
mod tokens;

pub use client::{ApiClient, ListParams};
pub use queries::Deleted;
pub use tokens::TokenStore;

pub use client::METRIC_REQUEST_MS;
