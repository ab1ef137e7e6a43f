//! Activity façade: the units of work a workflow runtime schedules.
//!
//! Each activity receives its own credentials and builds a fresh
//! [`JiraClient`] for the duration of the call. Nothing is shared between
//! invocations except the [`Store`] and the cancellation token handed in
//! through [`ActivityContext`].
//!
//! | Activity | Name | Shape |
//! |----------|------|-------|
//! | [`fetch_issues`] | `jira.FetchIssues` | one page, project filter |
//! | [`search_jql`] | `jira.SearchJQL` | one page, raw JQL |
//! | [`fetch_issue`] | `jira.FetchIssue` | one issue by key |
//! | [`fetch_all_issues`] | `jira.FetchAllIssues` | every page, project filter |
//! | [`search_all_jql`] | `jira.SearchAllJQL` | every page, raw JQL |
//!
//! The fetch-all activities drain the search with
//! [`paginate_all`](crate::paginate::paginate_all), normalize every issue
//! once pagination completes, and store the whole set in one call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use jira_harness_core::jql::IssueQuery;
use jira_harness_core::models::{CanonicalDocument, DataRef, Issue, Page};
use jira_harness_core::normalize::issue_to_document;
use jira_harness_core::store::Store;

use crate::client::{ClientConfig, JiraClient, SearchParams};
use crate::paginate::{paginate_all, PageRequest, PageSource, PaginateOptions, DEFAULT_PAGE_SIZE};

pub const FETCH_ISSUES: &str = "jira.FetchIssues";
pub const SEARCH_JQL: &str = "jira.SearchJQL";
pub const FETCH_ISSUE: &str = "jira.FetchIssue";
pub const FETCH_ALL_ISSUES: &str = "jira.FetchAllIssues";
pub const SEARCH_ALL_JQL: &str = "jira.SearchAllJQL";

/// Allowed duration declared for the fetch-all activities.
pub const FETCH_ALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Returned (inside `anyhow::Error`) when the context's token fires.
#[derive(Debug, Error)]
#[error("activity cancelled")]
pub struct Cancelled;

/// Per-invocation context supplied by the host runtime.
#[derive(Clone)]
pub struct ActivityContext {
    pub store: Arc<dyn Store>,
    pub cancel: CancellationToken,
}

impl ActivityContext {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `fut` unless the context is cancelled first; dropping it aborts
    /// any in-flight request.
    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled.into()),
            result = fut => result,
        }
    }
}

/// Jira credentials carried by every activity input.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    /// Per-request deadline; the client default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Credentials {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            email: config.email.clone(),
            api_token: config.api_token.clone(),
            timeout_secs: Some(config.timeout.as_secs()),
        }
    }

    /// Build a client for this call only.
    pub fn client(&self) -> Result<JiraClient> {
        JiraClient::new(ClientConfig {
            base_url: self.base_url.clone(),
            email: self.email.clone(),
            api_token: self.api_token.clone(),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(0)),
        })
        .context("create client")
    }
}

fn page_size_or_default(max_results: usize) -> usize {
    if max_results == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        max_results
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Single-page activities
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchIssuesInput {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub project: String,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Page size; 0 means 100.
    #[serde(default)]
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchJqlInput {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub jql: String,
    #[serde(default)]
    pub max_results: usize,
}

/// Result of a single-page activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutput {
    #[serde(rename = "ref")]
    pub data_ref: DataRef,
    /// Documents stored from this page.
    pub count: usize,
    /// Server-reported total for the query.
    pub total: usize,
}

/// Fetch the first page of a project's issues and store them.
#[instrument(level = "info", skip_all, fields(project = %input.project))]
pub async fn fetch_issues(ctx: &ActivityContext, input: FetchIssuesInput) -> Result<PageOutput> {
    let query = IssueQuery::project(input.project, input.since);
    store_first_page(ctx, &input.credentials, &query, input.max_results).await
}

/// Fetch the first page of a JQL search and store it.
#[instrument(level = "info", skip_all)]
pub async fn search_jql(ctx: &ActivityContext, input: SearchJqlInput) -> Result<PageOutput> {
    let query = IssueQuery::raw(input.jql);
    store_first_page(ctx, &input.credentials, &query, input.max_results).await
}

async fn store_first_page(
    ctx: &ActivityContext,
    credentials: &Credentials,
    query: &IssueQuery,
    max_results: usize,
) -> Result<PageOutput> {
    let client = credentials.client()?;
    let jql = query.to_jql();
    let max_results = page_size_or_default(max_results);

    let result = ctx
        .cancellable(async {
            client
                .search_jql(&jql, max_results)
                .await
                .context("search jql")
        })
        .await?;

    let docs: Vec<CanonicalDocument> = result.issues.iter().map(issue_to_document).collect();
    let data_ref = ctx
        .store
        .store_documents(&docs)
        .await
        .context("store documents")?;

    info!(count = docs.len(), total = result.total, %data_ref, "stored page");
    Ok(PageOutput {
        data_ref,
        count: docs.len(),
        total: result.total,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchIssueInput {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub issue_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchIssueOutput {
    pub document: Option<CanonicalDocument>,
    pub found: bool,
}

/// Fetch and normalize one issue. A 404 yields `found = false`.
#[instrument(level = "info", skip_all, fields(issue_key = %input.issue_key))]
pub async fn fetch_issue(ctx: &ActivityContext, input: FetchIssueInput) -> Result<FetchIssueOutput> {
    let client = input.credentials.client()?;

    let issue = ctx
        .cancellable(async {
            client
                .get_issue(&input.issue_key)
                .await
                .context("get issue")
        })
        .await?;

    let document = issue.as_ref().map(issue_to_document);
    Ok(FetchIssueOutput {
        found: document.is_some(),
        document,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Fetch-all activities
// ═══════════════════════════════════════════════════════════════════════

/// Page source over one compiled JQL query.
pub struct IssuePages {
    client: JiraClient,
    jql: String,
}

impl IssuePages {
    pub fn new(client: JiraClient, query: &IssueQuery) -> Self {
        Self {
            client,
            jql: query.to_jql(),
        }
    }
}

#[async_trait]
impl PageSource for IssuePages {
    type Item = Issue;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Issue>> {
        let result = self
            .client
            .search(&SearchParams {
                jql: self.jql.clone(),
                start_at: request.start_at,
                max_results: request.page_size,
            })
            .await
            .context("search jql")?;
        Ok(result.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchAllIssuesInput {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub project: String,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Per-page size; 0 means 100.
    #[serde(default)]
    pub max_results: usize,
    /// Resume cursor from an earlier run; empty starts from the top.
    #[serde(default)]
    pub cursor: String,
    /// Page budget for this run; must be > 0 when set.
    #[serde(default)]
    pub max_pages: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchAllJqlInput {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub jql: String,
    #[serde(default)]
    pub max_results: usize,
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub max_pages: Option<usize>,
}

/// Result of a fetch-all activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchAllOutput {
    #[serde(rename = "ref")]
    pub data_ref: DataRef,
    pub count: usize,
    pub page_count: usize,
    /// Empty when the dataset was exhausted; otherwise the resume cursor.
    pub final_cursor: String,
}

/// Fetch every issue of a project and store them as one batch.
#[instrument(level = "info", skip_all, fields(project = %input.project, cursor = %input.cursor))]
pub async fn fetch_all_issues(
    ctx: &ActivityContext,
    input: FetchAllIssuesInput,
) -> Result<FetchAllOutput> {
    let options = paginate_options(input.cursor, input.max_results, input.max_pages)?;
    let query = IssueQuery::project(input.project, input.since);
    store_all_pages(ctx, &input.credentials, &query, options).await
}

/// Fetch every issue matching a JQL query and store them as one batch.
#[instrument(level = "info", skip_all, fields(cursor = %input.cursor))]
pub async fn search_all_jql(
    ctx: &ActivityContext,
    input: SearchAllJqlInput,
) -> Result<FetchAllOutput> {
    let options = paginate_options(input.cursor, input.max_results, input.max_pages)?;
    let query = IssueQuery::raw(input.jql);
    store_all_pages(ctx, &input.credentials, &query, options).await
}

fn paginate_options(
    cursor: String,
    max_results: usize,
    max_pages: Option<usize>,
) -> Result<PaginateOptions> {
    if max_pages == Some(0) {
        bail!("max_pages must be > 0 (omit it for no limit)");
    }
    Ok(PaginateOptions {
        start_cursor: cursor,
        page_size: page_size_or_default(max_results),
        max_pages,
    })
}

async fn store_all_pages(
    ctx: &ActivityContext,
    credentials: &Credentials,
    query: &IssueQuery,
    options: PaginateOptions,
) -> Result<FetchAllOutput> {
    let pages = IssuePages::new(credentials.client()?, query);
    let run = paginate_all(&pages, options, &ctx.cancel)
        .await
        .context("paginate")?;

    let docs: Vec<CanonicalDocument> = run.items.iter().map(issue_to_document).collect();
    let data_ref = ctx
        .store
        .store_documents(&docs)
        .await
        .context("store documents")?;

    info!(
        count = docs.len(),
        pages = run.page_count,
        final_cursor = %run.final_cursor,
        %data_ref,
        "stored all pages"
    );
    Ok(FetchAllOutput {
        data_ref,
        count: docs.len(),
        page_count: run.page_count,
        final_cursor: run.final_cursor,
    })
}
