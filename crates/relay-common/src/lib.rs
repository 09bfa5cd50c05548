//! Shared types for the relay.
//!
//! This crate contains:
//! - **Auth primitives**: shared-secret token validation, bearer header parsing
//! - **ID generation**: Prefixed UUIDv7 helpers (`conn_`)

pub mod auth;
pub mod ids;
