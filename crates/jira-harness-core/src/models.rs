//! Core data models used throughout Jira Harness.
//!
//! Two families of types live here:
//!
//! - **Wire types** ([`Issue`], [`IssueFields`], [`SearchResult`], …) mirror
//!   the JSON returned by the Jira Cloud REST API v3. They are lenient:
//!   every field except the issue key defaults when absent, so a sparse or
//!   partially redacted issue still deserializes.
//! - **Output types** ([`CanonicalDocument`], [`DataRef`], [`Page`]) are the
//!   source-agnostic shapes handed to storage and to the pagination engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Source tag stamped on every document produced from Jira.
pub const SOURCE: &str = "jira";

/// A Jira issue as returned by `/rest/api/3/issue/{key}` and inside search results.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Issue {
    #[serde(default)]
    pub id: String,
    pub key: String,
    /// Canonical REST link back to the issue (`self` on the wire).
    #[serde(rename = "self", default)]
    pub self_url: String,
    #[serde(default)]
    pub fields: IssueFields,
}

/// The `fields` object of an issue.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IssueFields {
    pub summary: String,
    /// Plain text, flattened from Atlassian Document Format when needed.
    #[serde(deserialize_with = "text_or_adf")]
    pub description: String,
    pub status: Status,
    #[serde(rename = "issuetype")]
    pub issue_type: IssueType,
    pub project: Project,
    pub created: String,
    pub updated: String,
    pub labels: Vec<String>,
    pub priority: Option<Priority>,
    pub assignee: Option<User>,
    pub reporter: Option<User>,
    #[serde(rename = "comment")]
    pub comments: Option<Comments>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Status {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IssueType {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Project {
    pub key: String,
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Priority {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    pub display_name: String,
    pub email_address: String,
    pub account_id: String,
}

/// The `comment` field of an issue (a paged container on the wire).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Comments {
    pub total: usize,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Comment {
    pub id: String,
    #[serde(deserialize_with = "text_or_adf")]
    pub body: String,
    pub author: User,
    pub created: String,
    pub updated: String,
}

/// Response body of `GET /rest/api/3/search`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchResult {
    pub start_at: usize,
    pub max_results: usize,
    pub total: usize,
    pub issues: Vec<Issue>,
}

/// Normalized, source-agnostic representation of one external record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDocument {
    pub id: String,
    pub content: String,
    pub title: String,
    pub source: String,
    pub url: String,
    pub metadata: BTreeMap<String, String>,
    /// Unix epoch when the upstream timestamp was absent or unparseable.
    pub updated_at: DateTime<Utc>,
}

/// Opaque handle to a batch of documents held by a [`Store`](crate::store::Store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataRef {
    /// Backend that issued the handle (e.g. `"memory"`, `"sqlite"`).
    pub backend: String,
    pub id: String,
}

impl std::fmt::Display for DataRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.backend, self.id)
    }
}

impl std::str::FromStr for DataRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.split_once(':') {
            Some((backend, id)) if !backend.is_empty() && !id.is_empty() => Ok(Self {
                backend: backend.to_string(),
                id: id.to_string(),
            }),
            _ => anyhow::bail!("invalid data ref '{}': expected <backend>:<id>", s),
        }
    }
}

/// One bounded batch of items plus the server-reported total for the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl From<SearchResult> for Page<Issue> {
    fn from(result: SearchResult) -> Self {
        Self {
            items: result.issues,
            total: result.total,
        }
    }
}

fn text_or_adf<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(flatten_text).unwrap_or_default())
}

/// Render a rich-text field as plain text.
///
/// Strings pass through verbatim. Atlassian Document Format trees are
/// walked depth-first: text nodes are concatenated, mentions and emoji use
/// their display text, and block nodes end with a newline. Any other JSON
/// shape yields an empty string.
pub fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) => {
            let mut out = String::new();
            collect_adf(value, &mut out);
            out.trim_end_matches('\n').to_string()
        }
        _ => String::new(),
    }
}

fn collect_adf(node: &Value, out: &mut String) {
    let node_type = node.get("type").and_then(Value::as_str).unwrap_or("");
    match node_type {
        "text" => {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        "hardBreak" => out.push('\n'),
        "mention" | "emoji" => {
            let attrs = node.get("attrs");
            if let Some(text) = attrs
                .and_then(|a| a.get("text"))
                .and_then(Value::as_str)
            {
                out.push_str(text);
            }
        }
        _ => {}
    }

    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            collect_adf(child, out);
        }
    }

    let is_block = matches!(
        node_type,
        "paragraph" | "heading" | "codeBlock" | "blockquote" | "rule" | "panel"
    );
    if is_block && !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}
