pub mod api;
pub mod config;
pub mod infra;
pub mod query;
