//! # Jira Harness
//!
//! Pull issues from Jira page by page, normalize them into canonical
//! documents, and hand them to a document store, as discrete activities a
//! workflow runtime can schedule.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────┐
//! │ Activities │──▶│  Paginator   │──▶│ JiraClient │──▶│ Jira API │
//! │ (registry) │   │ cursor loop  │   │ one page   │   └──────────┘
//! └─────┬──────┘   └──────────────┘   └────────────┘
//!       │ issues
//!       ▼
//! ┌────────────┐   ┌──────────────┐
//! │ Normalizer │──▶│    Store     │
//! │ (core)     │   │ memory/SQLite│
//! └────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! jsync init                                  # create database
//! jsync fetch-all --project ENG               # every ENG issue
//! jsync search-all "assignee = currentUser()" --max-pages 5
//! jsync show sqlite:<batch-uuid>              # print stored documents
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`client`] | Jira REST client |
//! | [`paginate`] | Cursor-based fetch-all engine |
//! | [`activities`] | Single-page, single-issue, and fetch-all activities |
//! | [`registry`] | Name-based activity registry |
//! | [`sqlite_store`] | SQLite document store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! Models, JQL compilation, normalization, and the store trait live in the
//! `jira-harness-core` crate.

pub mod activities;
pub mod client;
pub mod config;
pub mod db;
pub mod migrate;
pub mod paginate;
pub mod registry;
pub mod sqlite_store;
