//! Activity registration for a host workflow runtime.
//!
//! A runtime schedules work by stable string name. [`Activity`] is the
//! type-erased seam: JSON in, JSON out, plus the metadata a runtime needs
//! to schedule it (description and declared maximum duration).
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               ActivityRegistry               │
//! │  jira.FetchIssues    jira.SearchJQL          │
//! │  jira.FetchIssue     jira.FetchAllIssues ⏱   │
//! │                      jira.SearchAllJQL   ⏱   │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!        invoke(name, input, &ActivityContext)
//! ```
//!
//! # Example
//!
//! ```rust
//! use jira_harness::registry::ActivityRegistry;
//!
//! let registry = ActivityRegistry::with_builtins();
//! assert!(registry.find("jira.FetchAllIssues").is_some());
//! ```

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::activities::{self, ActivityContext};

/// Provider name reported to the host runtime. Also the prefix of every
/// builtin activity name.
pub const PROVIDER_NAME: &str = "jira";

/// Provider version reported to the host runtime.
pub const PROVIDER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A schedulable unit of work.
#[async_trait]
pub trait Activity: Send + Sync {
    /// Stable registration name (e.g. `"jira.FetchIssues"`).
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str;

    /// Maximum duration to declare to the runtime, if longer than its default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Run the activity on a JSON input, returning a JSON output.
    async fn execute(&self, input: Value, ctx: &ActivityContext) -> Result<Value>;
}

fn decode_input<T: DeserializeOwned>(name: &str, input: Value) -> Result<T> {
    serde_json::from_value(input).with_context(|| format!("decode {} input", name))
}

fn encode_output<T: Serialize>(output: &T) -> Result<Value> {
    serde_json::to_value(output).context("encode output")
}

/// `jira.FetchIssues`. Delegates to [`activities::fetch_issues`].
pub struct FetchIssuesActivity;

#[async_trait]
impl Activity for FetchIssuesActivity {
    fn name(&self) -> &str {
        activities::FETCH_ISSUES
    }

    fn description(&self) -> &str {
        "Fetch one page of a project's issues and store them"
    }

    async fn execute(&self, input: Value, ctx: &ActivityContext) -> Result<Value> {
        let input = decode_input(self.name(), input)?;
        encode_output(&activities::fetch_issues(ctx, input).await?)
    }
}

/// `jira.SearchJQL`. Delegates to [`activities::search_jql`].
pub struct SearchJqlActivity;

#[async_trait]
impl Activity for SearchJqlActivity {
    fn name(&self) -> &str {
        activities::SEARCH_JQL
    }

    fn description(&self) -> &str {
        "Fetch one page of a JQL search and store it"
    }

    async fn execute(&self, input: Value, ctx: &ActivityContext) -> Result<Value> {
        let input = decode_input(self.name(), input)?;
        encode_output(&activities::search_jql(ctx, input).await?)
    }
}

/// `jira.FetchIssue`. Delegates to [`activities::fetch_issue`].
pub struct FetchIssueActivity;

#[async_trait]
impl Activity for FetchIssueActivity {
    fn name(&self) -> &str {
        activities::FETCH_ISSUE
    }

    fn description(&self) -> &str {
        "Fetch and normalize a single issue by key"
    }

    async fn execute(&self, input: Value, ctx: &ActivityContext) -> Result<Value> {
        let input = decode_input(self.name(), input)?;
        encode_output(&activities::fetch_issue(ctx, input).await?)
    }
}

/// `jira.FetchAllIssues`. Delegates to [`activities::fetch_all_issues`].
pub struct FetchAllIssuesActivity;

#[async_trait]
impl Activity for FetchAllIssuesActivity {
    fn name(&self) -> &str {
        activities::FETCH_ALL_ISSUES
    }

    fn description(&self) -> &str {
        "Fetch every issue of a project across all pages and store them"
    }

    fn timeout(&self) -> Option<Duration> {
        Some(activities::FETCH_ALL_TIMEOUT)
    }

    async fn execute(&self, input: Value, ctx: &ActivityContext) -> Result<Value> {
        let input = decode_input(self.name(), input)?;
        encode_output(&activities::fetch_all_issues(ctx, input).await?)
    }
}

/// `jira.SearchAllJQL`. Delegates to [`activities::search_all_jql`].
pub struct SearchAllJqlActivity;

#[async_trait]
impl Activity for SearchAllJqlActivity {
    fn name(&self) -> &str {
        activities::SEARCH_ALL_JQL
    }

    fn description(&self) -> &str {
        "Fetch every issue matching a JQL query across all pages and store them"
    }

    fn timeout(&self) -> Option<Duration> {
        Some(activities::FETCH_ALL_TIMEOUT)
    }

    async fn execute(&self, input: Value, ctx: &ActivityContext) -> Result<Value> {
        let input = decode_input(self.name(), input)?;
        encode_output(&activities::search_all_jql(ctx, input).await?)
    }
}

/// Registry of activities, looked up by name.
pub struct ActivityRegistry {
    activities: Vec<Box<dyn Activity>>,
}

impl ActivityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            activities: Vec::new(),
        }
    }

    /// Create a registry holding the five Jira activities.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FetchIssuesActivity));
        registry.register(Box::new(SearchJqlActivity));
        registry.register(Box::new(FetchIssueActivity));
        registry.register(Box::new(FetchAllIssuesActivity));
        registry.register(Box::new(SearchAllJqlActivity));
        registry
    }

    /// Register an activity. A later registration with the same name
    /// shadows the earlier one.
    pub fn register(&mut self, activity: Box<dyn Activity>) {
        if self.find(activity.name()).is_some() {
            warn!(name = activity.name(), "activity re-registered; replacing");
            let name = activity.name().to_string();
            self.activities.retain(|a| a.name() != name);
        }
        self.activities.push(activity);
    }

    pub fn activities(&self) -> &[Box<dyn Activity>] {
        &self.activities
    }

    pub fn find(&self, name: &str) -> Option<&dyn Activity> {
        self.activities
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    /// Run an activity by name, bounded by its declared timeout.
    pub async fn invoke(&self, name: &str, input: Value, ctx: &ActivityContext) -> Result<Value> {
        let Some(activity) = self.find(name) else {
            bail!(
                "Unknown activity: '{}'. Available: {}",
                name,
                self.activities
                    .iter()
                    .map(|a| a.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        };

        info!(activity = name, "starting activity");
        match activity.timeout() {
            Some(limit) => tokio::time::timeout(limit, activity.execute(input, ctx))
                .await
                .map_err(|_| anyhow!("activity '{}' exceeded {:?}", name, limit))?,
            None => activity.execute(input, ctx).await,
        }
    }
}

impl Default for ActivityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
