//! Filtered, recency-ordered, paginated retrieval.
//!
//! Filtering is pushed to the store, but ordering is computed in memory over
//! the complete filtered candidate set before pagination. The persisted sort
//! key (`normalized_posted_at`) can be NULL for rows that predate
//! normalization, and a store-level ORDER BY over a partially populated
//! column would silently interleave ordered and unordered rows.

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{self, Post};
use crate::timestamp;

/// Hard cap on the candidate set fetched from the store.
pub const CANDIDATE_CAP: i64 = 1000;

/// Pagination bounds. Out-of-range values are clamped, never rejected.
pub const MAX_LIMIT: i64 = 1000;
pub const DEFAULT_LIMIT: i64 = 100;

/// Combinable filters, all optional, joined with logical AND.
#[derive(Debug, Clone, Default)]
pub struct PostFilters {
    /// Exact `group_url` or case-insensitive `group_name` match.
    pub group: Option<String>,
    /// Case-insensitive substring match against title OR text.
    pub search: Option<String>,
    /// Only posts with `notified = false`.
    pub only_new: bool,
    /// Substring match against the stored category.
    pub category: Option<String>,
    /// Substring match against the stored location.
    pub location: Option<String>,
}

/// One page of query results. `total` is the size of the full filtered set
/// this call observed, not an independently computed count.
#[derive(Debug, Serialize)]
pub struct QueryPage {
    pub posts: Vec<Post>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query posts under `filters`, newest first, sliced to `[offset, offset+limit)`.
///
/// # Errors
///
/// Returns an error only on store failure.
pub async fn query_posts(
    pool: &SqlitePool,
    filters: &PostFilters,
    limit: i64,
    offset: i64,
) -> Result<QueryPage> {
    query_posts_at(pool, filters, limit, offset, Local::now().naive_local()).await
}

/// [`query_posts`] with an explicit reference instant, used to normalize
/// legacy rows whose `normalized_posted_at` was never persisted. The lazy
/// result is not written back: persisting it here would re-derive relative
/// timestamps against the wrong "now".
pub async fn query_posts_at(
    pool: &SqlitePool,
    filters: &PostFilters,
    limit: i64,
    offset: i64,
    now: NaiveDateTime,
) -> Result<QueryPage> {
    let limit = limit.clamp(1, MAX_LIMIT);
    let offset = offset.max(0);

    let candidates = db::fetch_filtered_posts(pool, filters, CANDIDATE_CAP).await?;

    let mut keyed: Vec<(NaiveDateTime, Post)> = candidates
        .into_iter()
        .map(|post| {
            let key = post
                .posted_at()
                .unwrap_or_else(|| timestamp::normalize(&post.raw_timestamp, now));
            (key, post)
        })
        .collect();

    // Descending by normalized instant; ties broken by rowid descending so
    // the order is total and pagination is stable across calls.
    keyed.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.id.cmp(&a.1.id)));

    let total = i64::try_from(keyed.len()).unwrap_or(i64::MAX);

    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(keyed.len());
    let page_len = usize::try_from(limit).unwrap_or(usize::MAX);
    let end = start.saturating_add(page_len).min(keyed.len());

    let posts = keyed
        .drain(start..end)
        .map(|(_, post)| post)
        .collect();

    Ok(QueryPage {
        posts,
        total,
        limit,
        offset,
    })
}
