//! # Jira Harness Core
//!
//! Runtime-free logic for Jira Harness: issue wire models, JQL compilation,
//! issue → document normalization, and the storage trait.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Everything
//! here is deterministic and can be exercised without a network.

pub mod jql;
pub mod models;
pub mod normalize;
pub mod store;
