//! Issue → document normalization.
//!
//! [`issue_to_document`] is a pure function: the same [`Issue`] always yields
//! the same [`CanonicalDocument`]. It never fails. Missing optional fields are
//! omitted from the metadata map and an unparseable `updated` timestamp
//! falls back to the Unix epoch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{CanonicalDocument, Issue, SOURCE};

/// Timestamp layout used by Jira for `created` / `updated` (e.g.
/// `2024-01-15T10:30:00.000+0000`).
pub const JIRA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Map one Jira issue into the canonical document shape.
///
/// `content` is the summary, then the description (if any) after a blank
/// line, then one `[Comment by <name>]: <body>` paragraph per comment in
/// the order the API returned them.
pub fn issue_to_document(issue: &Issue) -> CanonicalDocument {
    let fields = &issue.fields;

    let mut content = fields.summary.clone();
    if !fields.description.is_empty() {
        content.push_str("\n\n");
        content.push_str(&fields.description);
    }
    if let Some(comments) = &fields.comments {
        for comment in &comments.comments {
            content.push_str(&format!(
                "\n\n[Comment by {}]: {}",
                comment.author.display_name, comment.body
            ));
        }
    }

    let mut metadata = BTreeMap::new();
    metadata.insert("issue_key".to_string(), issue.key.clone());
    metadata.insert("project".to_string(), fields.project.key.clone());
    metadata.insert("status".to_string(), fields.status.name.clone());
    metadata.insert("issue_type".to_string(), fields.issue_type.name.clone());
    if let Some(priority) = &fields.priority {
        metadata.insert("priority".to_string(), priority.name.clone());
    }
    if let Some(assignee) = &fields.assignee {
        metadata.insert("assignee".to_string(), assignee.display_name.clone());
    }

    CanonicalDocument {
        id: issue.key.clone(),
        content,
        title: fields.summary.clone(),
        source: SOURCE.to_string(),
        url: issue.self_url.clone(),
        metadata,
        updated_at: parse_timestamp(&fields.updated).unwrap_or_default(),
    }
}

/// Parse a Jira timestamp, returning `None` for empty or malformed input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_str(raw, JIRA_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
