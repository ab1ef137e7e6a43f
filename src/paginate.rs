//! Cursor-based fetch-all pagination.
//!
//! Turns a page-at-a-time search API into one complete, resumable fetch.
//! The engine knows nothing about Jira: anything implementing
//! [`PageSource`] (or any async closure wrapped with [`page_fn`]) can be
//! drained with [`paginate_all`].
//!
//! # Cursor arithmetic
//!
//! A cursor is the zero-based start offset encoded as a decimal string;
//! the empty string means "start at 0". After each page:
//!
//! ```text
//! next     = min(offset + items_in_page, page.total)
//! has_more = next < page.total
//! ```
//!
//! An offset that would overflow `usize` ends the run like an exhausted
//! dataset.
//!
//! When `has_more` holds the cursor becomes `next.to_string()` and the loop
//! continues, otherwise the run ends with an empty final cursor.
//!
//! # Termination
//!
//! - A page with zero items while the server still reports more is treated
//!   as the end of the dataset (logged at `warn`), never retried.
//! - With [`PaginateOptions::max_pages`] set, the run stops after that many
//!   pages and reports the next cursor as `final_cursor` so a later run can
//!   resume from it.
//! - Cancellation is checked before every page and also races the
//!   in-flight fetch; either way the items accumulated so far come back
//!   inside [`PaginateError::Cancelled`], never as a silent success.
//!
//! Pages are fetched strictly one after another: each cursor depends on
//! the length of the previous page.

use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::num::ParseIntError;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use jira_harness_core::models::Page;

/// Page size used when the caller passes zero.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// What the engine asks a [`PageSource`] for on each iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Opaque cursor for this page (`""` on a fresh start).
    pub cursor: String,
    /// The cursor decoded as a start offset.
    pub start_at: usize,
    pub page_size: usize,
}

/// Anything that can return one page of items for a cursor.
///
/// Implement this once per item kind; the engine is generic over it.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Self::Item>>;
}

/// [`PageSource`] backed by an async closure. Build with [`page_fn`].
pub struct FnPageSource<F, T> {
    f: F,
    _item: PhantomData<fn() -> T>,
}

/// Wrap an async closure `Fn(PageRequest) -> Future<Output = Result<Page<T>>>`
/// as a [`PageSource`].
pub fn page_fn<F, Fut, T>(f: F) -> FnPageSource<F, T>
where
    F: Fn(PageRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>>> + Send,
    T: Send,
{
    FnPageSource {
        f,
        _item: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> PageSource for FnPageSource<F, T>
where
    F: Fn(PageRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>>> + Send,
    T: Send,
{
    type Item = T;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>> {
        (self.f)(request.clone()).await
    }
}

/// Knobs for one pagination run.
#[derive(Debug, Clone)]
pub struct PaginateOptions {
    /// Cursor to resume from; `""` starts at the beginning.
    pub start_cursor: String,
    /// Items requested per page. Zero means [`DEFAULT_PAGE_SIZE`].
    pub page_size: usize,
    /// Stop after this many pages even if more remain. `Some(0)` is the
    /// same as `None`; the activities reject it before getting here.
    pub max_pages: Option<usize>,
}

impl Default for PaginateOptions {
    fn default() -> Self {
        Self {
            start_cursor: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
        }
    }
}

/// Everything a completed (or interrupted) run accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page_count: usize,
    /// `""` when the dataset is exhausted, otherwise where to resume.
    pub final_cursor: String,
}

impl<T> Paginated<T> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            page_count: 0,
            final_cursor: String::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PaginateError<T: Debug> {
    /// The start cursor is not a decimal offset. Terminal, not retried.
    #[error("parse cursor '{cursor}'")]
    InvalidCursor {
        cursor: String,
        #[source]
        source: ParseIntError,
    },

    /// The page source failed. Items from earlier pages are discarded.
    #[error("fetch page at cursor '{cursor}'")]
    Fetch {
        cursor: String,
        #[source]
        source: anyhow::Error,
    },

    /// The run was cancelled; `partial` holds what was fetched so far.
    #[error(
        "pagination cancelled after {} page(s), {} item(s) accumulated",
        .partial.page_count,
        .partial.items.len()
    )]
    Cancelled { partial: Paginated<T> },
}

/// Decode a cursor into a start offset (`""` → 0).
pub fn decode_cursor(cursor: &str) -> Result<usize, ParseIntError> {
    if cursor.is_empty() {
        Ok(0)
    } else {
        cursor.parse()
    }
}

/// Drain `source` page by page until the dataset is exhausted.
pub async fn paginate_all<S>(
    source: &S,
    options: PaginateOptions,
    cancel: &CancellationToken,
) -> std::result::Result<Paginated<S::Item>, PaginateError<S::Item>>
where
    S: PageSource + ?Sized,
    S::Item: Debug,
{
    let page_size = if options.page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        options.page_size
    };
    let max_pages = options.max_pages.filter(|m| *m > 0);

    let mut cursor = options.start_cursor;
    let mut offset = decode_cursor(&cursor).map_err(|source| PaginateError::InvalidCursor {
        cursor: cursor.clone(),
        source,
    })?;
    let mut run = Paginated::empty();

    loop {
        if cancel.is_cancelled() {
            return Err(PaginateError::Cancelled { partial: run });
        }

        let request = PageRequest {
            cursor: cursor.clone(),
            start_at: offset,
            page_size,
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = source.fetch_page(&request) => Some(result),
        };
        let page = match fetched {
            None => return Err(PaginateError::Cancelled { partial: run }),
            Some(Ok(page)) => page,
            Some(Err(source)) => return Err(PaginateError::Fetch { cursor, source }),
        };

        let total = page.total;
        let received = page.items.len();
        let next = offset
            .checked_add(received)
            .unwrap_or_else(|| {
                warn!(
                    cursor = %cursor,
                    received,
                    "cursor offset overflows; treating dataset as exhausted"
                );
                usize::MAX
            })
            .min(total);
        let has_more = next < total;

        run.items.extend(page.items);
        run.page_count += 1;
        debug!(
            page = run.page_count,
            cursor = %cursor,
            received,
            total,
            has_more,
            "fetched page"
        );

        if !has_more {
            break;
        }
        if received == 0 {
            warn!(
                cursor = %cursor,
                total,
                "empty page while server reports more items; treating dataset as exhausted"
            );
            break;
        }

        offset = next;
        cursor = next.to_string();

        if let Some(max) = max_pages {
            if run.page_count >= max {
                info!(pages = run.page_count, cursor = %cursor, "page budget reached; run is resumable");
                run.final_cursor = cursor;
                return Ok(run);
            }
        }
    }

    Ok(run)
}
