//! JQL query compilation.
//!
//! The harness only ever issues two query shapes: a project filter ordered
//! by last update (optionally bounded by a "changed since" timestamp), or a
//! caller-supplied JQL string passed through verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout accepted by JQL date comparisons.
pub const JQL_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// An issue query, immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueQuery {
    /// All issues of a project, newest update first.
    Project {
        project: String,
        /// Lower bound on `updated`, rendered as a UTC wall-clock literal.
        /// Jira evaluates JQL date literals in the querying account's
        /// profile timezone, so a non-UTC account sees the window shifted
        /// by its offset.
        #[serde(default)]
        since: Option<DateTime<Utc>>,
    },
    /// Pre-built JQL.
    Raw(String),
}

impl IssueQuery {
    pub fn project(project: impl Into<String>, since: Option<DateTime<Utc>>) -> Self {
        Self::Project {
            project: project.into(),
            since,
        }
    }

    pub fn raw(jql: impl Into<String>) -> Self {
        Self::Raw(jql.into())
    }

    /// Compile to the JQL string sent to `/rest/api/3/search`.
    pub fn to_jql(&self) -> String {
        match self {
            Self::Project {
                project,
                since: None,
            } => format!("project = {} ORDER BY updated DESC", project),
            Self::Project {
                project,
                since: Some(since),
            } => format!(
                "project = {} AND updated >= '{}' ORDER BY updated DESC",
                project,
                since.format(JQL_DATE_FORMAT)
            ),
            Self::Raw(jql) => jql.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn project_query_without_since() {
        let q = IssueQuery::project("ENG", None);
        assert_eq!(q.to_jql(), "project = ENG ORDER BY updated DESC");
    }

    #[test]
    fn project_query_with_since() {
        let since = Utc.with_ymd_and_hms(2024, 3, 5, 7, 9, 59).unwrap();
        let q = IssueQuery::project("ENG", Some(since));
        assert_eq!(
            q.to_jql(),
            "project = ENG AND updated >= '2024-03-05 07:09' ORDER BY updated DESC"
        );
    }

    #[test]
    fn since_from_another_offset_is_rendered_in_utc() {
        let local = chrono::FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 1, 30, 0)
            .unwrap();
        let q = IssueQuery::project("ENG", Some(local.with_timezone(&Utc)));
        assert_eq!(
            q.to_jql(),
            "project = ENG AND updated >= '2024-03-04 23:30' ORDER BY updated DESC"
        );
    }

    #[test]
    fn raw_query_is_verbatim() {
        let jql = "assignee = currentUser() AND status != Done";
        assert_eq!(IssueQuery::raw(jql).to_jql(), jql);
    }
}
