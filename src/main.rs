//! # Jira Harness CLI (`jsync`)
//!
//! Runs the Jira activities locally, outside a workflow runtime, against
//! the SQLite document store.
//!
//! ## Usage
//!
//! ```bash
//! jsync --config ./config/jsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jsync init` | Create the SQLite database and schema |
//! | `jsync activities` | List registered activities |
//! | `jsync fetch --project <KEY>` | Store one page of a project's issues |
//! | `jsync search "<jql>"` | Store one page of a JQL search |
//! | `jsync get <ISSUE-KEY>` | Print one normalized issue |
//! | `jsync fetch-all --project <KEY>` | Store every issue of a project |
//! | `jsync search-all "<jql>"` | Store every issue matching a JQL query |
//! | `jsync show <ref>` | Print the documents of a stored batch |
//!
//! Activity results are printed to stdout as JSON; logs go to stderr and
//! are filtered with `RUST_LOG` (default `info`). Ctrl-C cancels the
//! running activity between pages and aborts the in-flight request.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use jira_harness::activities::{
    self, ActivityContext, Credentials, FetchAllIssuesInput, FetchIssueInput, FetchIssuesInput,
    SearchAllJqlInput, SearchJqlInput,
};
use jira_harness::config::{self, Config};
use jira_harness::migrate;
use jira_harness::registry::{ActivityRegistry, PROVIDER_NAME, PROVIDER_VERSION};
use jira_harness::sqlite_store::SqliteStore;
use jira_harness_core::models::DataRef;
use jira_harness_core::store::Store;

/// Jira Harness CLI: pull Jira issues and store them as canonical documents.
#[derive(Parser)]
#[command(
    name = "jsync",
    about = "Jira Harness: pull Jira issues and store them as canonical documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/jsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// List registered activities and their declared timeouts.
    Activities,

    /// Fetch one page of a project's issues, newest update first.
    Fetch {
        /// Project key (e.g. `ENG`).
        #[arg(long)]
        project: String,

        /// Only issues updated at or after this time
        /// (`YYYY-MM-DD`, `YYYY-MM-DD HH:MM`, or RFC 3339). Sent to Jira in
        /// UTC; Jira reads it in the account's profile timezone.
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,

        /// Page size (defaults to `jira.page_size`).
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Fetch one page of a JQL search.
    Search {
        /// JQL query, passed through verbatim.
        jql: String,

        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Fetch and print a single normalized issue.
    Get {
        /// Issue key (e.g. `ENG-42`).
        issue_key: String,
    },

    /// Fetch every issue of a project across all pages.
    FetchAll {
        #[arg(long)]
        project: String,

        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,

        #[arg(long)]
        max_results: Option<usize>,

        /// Resume from a cursor printed by an earlier run.
        #[arg(long, default_value = "")]
        cursor: String,

        /// Stop after this many pages (> 0); the output carries a resume cursor.
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Fetch every issue matching a JQL query across all pages.
    SearchAll {
        jql: String,

        #[arg(long)]
        max_results: Option<usize>,

        #[arg(long, default_value = "")]
        cursor: String,

        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Print the documents stored under a batch reference (`sqlite:<uuid>`).
    Show {
        #[arg(value_name = "REF")]
        data_ref: DataRef,
    },
}

/// Parse `--since` as RFC 3339, `YYYY-MM-DD HH:MM`, or `YYYY-MM-DD` (UTC).
fn parse_since(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date '{}': expected YYYY-MM-DD[ HH:MM] or RFC 3339", s))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            token.cancel();
        }
    });
}

struct Runner {
    config: Config,
    credentials: Credentials,
    registry: ActivityRegistry,
    store: Arc<SqliteStore>,
    ctx: ActivityContext,
}

impl Runner {
    async fn new(config: Config) -> Result<Self> {
        let credentials = Credentials::from_client_config(&config.jira.client_config()?);
        let store = Arc::new(SqliteStore::open(&config).await?);
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());
        let ctx = ActivityContext::new(store.clone()).with_cancel(cancel);

        Ok(Self {
            config,
            credentials,
            registry: ActivityRegistry::with_builtins(),
            store,
            ctx,
        })
    }

    fn page_size(&self, max_results: Option<usize>) -> usize {
        max_results.unwrap_or(self.config.jira.page_size)
    }

    async fn run<T: Serialize>(&self, name: &str, input: &T) -> Result<()> {
        let input = serde_json::to_value(input).context("encode input")?;
        let output = self.registry.invoke(name, input, &self.ctx).await?;
        print_json(&output)
    }

    async fn execute(&self, command: Commands) -> Result<()> {
        let credentials = self.credentials.clone();

        match command {
            Commands::Init | Commands::Activities => unreachable!("handled above"),
            Commands::Fetch {
                project,
                since,
                max_results,
            } => {
                let input = FetchIssuesInput {
                    credentials,
                    project,
                    since,
                    max_results: self.page_size(max_results),
                };
                self.run(activities::FETCH_ISSUES, &input).await
            }
            Commands::Search { jql, max_results } => {
                let input = SearchJqlInput {
                    credentials,
                    jql,
                    max_results: self.page_size(max_results),
                };
                self.run(activities::SEARCH_JQL, &input).await
            }
            Commands::Get { issue_key } => {
                let input = FetchIssueInput {
                    credentials,
                    issue_key,
                };
                self.run(activities::FETCH_ISSUE, &input).await
            }
            Commands::FetchAll {
                project,
                since,
                max_results,
                cursor,
                max_pages,
            } => {
                let input = FetchAllIssuesInput {
                    credentials,
                    project,
                    since,
                    max_results: self.page_size(max_results),
                    cursor,
                    max_pages,
                };
                self.run(activities::FETCH_ALL_ISSUES, &input).await
            }
            Commands::SearchAll {
                jql,
                max_results,
                cursor,
                max_pages,
            } => {
                let input = SearchAllJqlInput {
                    credentials,
                    jql,
                    max_results: self.page_size(max_results),
                    cursor,
                    max_pages,
                };
                self.run(activities::SEARCH_ALL_JQL, &input).await
            }
            Commands::Show { data_ref } => {
                let docs = self
                    .store
                    .load_documents(&data_ref)
                    .await?
                    .with_context(|| format!("no stored batch for {}", data_ref))?;
                print_json(&docs)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that don't require config
    if let Commands::Activities = cli.command {
        let registry = ActivityRegistry::with_builtins();
        println!("{} {}", PROVIDER_NAME, PROVIDER_VERSION);
        for activity in registry.activities() {
            let timeout = activity
                .timeout()
                .map(|d| format!("{}m", d.as_secs() / 60))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<22} {:>5}  {}",
                activity.name(),
                timeout,
                activity.description()
            );
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let runner = Runner::new(cfg).await?;
    // Close the pool on every path, including activity errors.
    let result = runner.execute(cli.command).await;
    runner.store.close().await;
    result
}
