//! Jira REST API client.
//!
//! A thin wrapper around the two endpoints the harness needs:
//!
//! | Method | Endpoint |
//! |--------|----------|
//! | [`JiraClient::search`] | `GET /rest/api/3/search?jql=&startAt=&maxResults=` |
//! | [`JiraClient::get_issue`] | `GET /rest/api/3/issue/{key}` |
//!
//! Every request carries HTTP Basic credentials (account email + API
//! token) and JSON `Accept` / `Content-Type` headers. Non-success
//! responses are surfaced as [`JiraError::Api`] with the status code and
//! the response body verbatim. Nothing here retries; retry policy belongs
//! to whatever schedules the calling activity.
//!
//! Clients are cheap and intended to be built per call from the
//! credentials an activity receives, never shared process-wide.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{debug, instrument};

use jira_harness_core::models::{Issue, SearchResult};

/// Per-request deadline applied when [`ClientConfig::timeout`] is zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size the API itself assumes when the caller does not pick one.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Failure of a single Jira API call.
#[derive(Debug, Error)]
pub enum JiraError {
    /// The endpoint URL could not be constructed from the base URL.
    #[error("invalid Jira URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The underlying HTTP client could not be built.
    #[error("create request: {0}")]
    Build(#[source] reqwest::Error),

    /// The request could not be executed (DNS, connect, TLS, timeout…).
    #[error("execute request: {0}")]
    Transport(#[source] reqwest::Error),

    /// Jira answered with a non-success status.
    #[error("jira API error: status={status} body={body}")]
    Api { status: u16, body: String },

    /// The response body was not the JSON shape we expected.
    #[error("decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl JiraError {
    /// HTTP status for [`JiraError::Api`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Connection settings for one client instance.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    /// Per-request deadline. Zero means [`DEFAULT_TIMEOUT`].
    pub timeout: Duration,
}

/// Parameters for one bounded JQL search.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub jql: String,
    /// Zero-based index of the first issue to return.
    pub start_at: usize,
    /// Page size ceiling. Zero means [`DEFAULT_MAX_RESULTS`].
    pub max_results: usize,
}

/// Jira REST API client.
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl JiraClient {
    pub fn new(config: ClientConfig) -> Result<Self, JiraError> {
        let timeout = if config.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            config.timeout
        };
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(JiraError::Build)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email,
            api_token: config.api_token,
        })
    }

    /// Search from the first result with the given page size.
    pub async fn search_jql(&self, jql: &str, max_results: usize) -> Result<SearchResult, JiraError> {
        self.search(&SearchParams {
            jql: jql.to_string(),
            start_at: 0,
            max_results,
        })
        .await
    }

    /// Run one bounded JQL search.
    #[instrument(level = "debug", skip(self, params), fields(start_at = params.start_at))]
    pub async fn search(&self, params: &SearchParams) -> Result<SearchResult, JiraError> {
        let max_results = if params.max_results == 0 {
            DEFAULT_MAX_RESULTS
        } else {
            params.max_results
        };

        let mut url = self.endpoint(&["rest", "api", "3", "search"])?;
        url.query_pairs_mut()
            .append_pair("jql", &params.jql)
            .append_pair("startAt", &params.start_at.to_string())
            .append_pair("maxResults", &max_results.to_string());

        let resp = self.get(url).await?;
        let status = resp.status();
        let result: SearchResult = decode(resp, status).await?;
        debug!(
            returned = result.issues.len(),
            total = result.total,
            "jira search page"
        );
        Ok(result)
    }

    /// Fetch a single issue by key (or numeric id).
    ///
    /// Returns `Ok(None)` when Jira answers 404.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_issue(&self, issue_key: &str) -> Result<Option<Issue>, JiraError> {
        let url = self.endpoint(&["rest", "api", "3", "issue", issue_key])?;

        let resp = self.get(url).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!("issue not found");
            return Ok(None);
        }
        decode(resp, status).await.map(Some)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, JiraError> {
        let invalid = |reason: String| JiraError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, JiraError> {
        self.http
            .get(url)
            .basic_auth(&self.email, Some(&self.api_token))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(JiraError::Transport)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    status: StatusCode,
) -> Result<T, JiraError> {
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(JiraError::Api {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await.map_err(JiraError::Transport)?;
    serde_json::from_slice(&bytes).map_err(JiraError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> JiraClient {
        JiraClient::new(ClientConfig {
            base_url: base.to_string(),
            email: "bot@acme.com".to_string(),
            api_token: "t".to_string(),
            timeout: Duration::ZERO,
        })
        .unwrap()
    }

    #[test]
    fn endpoint_joins_segments_and_trims_slash() {
        let c = client("https://acme.atlassian.net/");
        let url = c.endpoint(&["rest", "api", "3", "search"]).unwrap();
        assert_eq!(url.as_str(), "https://acme.atlassian.net/rest/api/3/search");
    }

    #[test]
    fn endpoint_keeps_context_path() {
        let c = client("https://intranet.example.com/jira");
        let url = c.endpoint(&["rest", "api", "3", "issue", "ENG-1"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://intranet.example.com/jira/rest/api/3/issue/ENG-1"
        );
    }

    #[test]
    fn endpoint_rejects_malformed_base() {
        let c = client("not a url");
        let err = c.endpoint(&["rest"]).unwrap_err();
        assert!(matches!(err, JiraError::InvalidUrl { .. }));
    }

    #[test]
    fn api_error_message_carries_status_and_body() {
        let err = JiraError::Api {
            status: 403,
            body: "Forbidden".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("Forbidden"));
        assert_eq!(err.status(), Some(403));
    }
}
