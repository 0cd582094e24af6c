use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{ClassificationUpdate, GroupCount, Post, ScrapedPost};
use crate::query::PostFilters;

// ========== Posts ==========

/// Get a post by its external stable identifier.
pub async fn get_post_by_post_id(pool: &SqlitePool, post_id: &str) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE post_id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post by post_id")
}

/// Insert a new post, returning its row ID, or `None` when a row with the
/// same `post_id` already exists.
///
/// The UNIQUE constraint on `post_id` is the arbiter for concurrent
/// ingestions of the same post: the loser of the race sees `None` and falls
/// through to the update/skip path instead of erroring.
pub async fn try_insert_post(
    pool: &SqlitePool,
    scraped: &ScrapedPost,
    normalized_posted_at: &str,
    scraped_at: &str,
) -> Result<Option<i64>> {
    let result = sqlx::query(
        r"
        INSERT INTO posts (
            post_id, title, text, url, group_name, group_url,
            raw_timestamp, normalized_posted_at, scraped_at, notified, ai_processed
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0)
        ON CONFLICT (post_id) DO NOTHING
        ",
    )
    .bind(&scraped.post_id)
    .bind(&scraped.title)
    .bind(&scraped.text)
    .bind(&scraped.url)
    .bind(&scraped.group_name)
    .bind(&scraped.group_url)
    .bind(&scraped.raw_timestamp)
    .bind(normalized_posted_at)
    .bind(scraped_at)
    .execute(pool)
    .await
    .context("Failed to insert post")?;

    if result.rows_affected() == 0 {
        Ok(None)
    } else {
        Ok(Some(result.last_insert_rowid()))
    }
}

/// Persist classification output and mark the post processed.
///
/// Touches only the classification columns; content, provenance and the
/// notified flag are immutable through this path.
pub async fn set_classification(
    pool: &SqlitePool,
    post_id: &str,
    update: &ClassificationUpdate,
) -> Result<()> {
    sqlx::query(
        r"
        UPDATE posts
        SET category = ?, secondary_categories = ?, location = ?,
            classification_features = ?, ai_processed = 1
        WHERE post_id = ?
        ",
    )
    .bind(&update.category)
    .bind(&update.secondary_categories)
    .bind(&update.location)
    .bind(&update.features)
    .bind(post_id)
    .execute(pool)
    .await
    .context("Failed to persist classification")?;

    Ok(())
}

/// Set `notified = true`. Idempotent; returns whether the post exists.
pub async fn set_notified(pool: &SqlitePool, post_id: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE posts SET notified = 1 WHERE post_id = ?")
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to mark post notified")?;

    Ok(result.rows_affected() > 0)
}

// ========== Filtered fetch ==========

/// A filter condition as a SQL fragment plus its bind values, assembled
/// per-filter so the WHERE clause only mentions filters that are present.
struct FilterClause {
    sql: &'static str,
    values: Vec<String>,
}

fn build_filter_clauses(filters: &PostFilters) -> Vec<FilterClause> {
    let mut clauses = Vec::new();

    if let Some(group) = &filters.group {
        // Exact group URL, or the group name compared case-insensitively:
        // the dashboard sends either form.
        clauses.push(FilterClause {
            sql: "(group_url = ? OR LOWER(group_name) = LOWER(?))",
            values: vec![group.clone(), group.trim().to_string()],
        });
    }

    if let Some(search) = &filters.search {
        let pattern = format!("%{search}%");
        clauses.push(FilterClause {
            sql: "(title LIKE ? OR text LIKE ?)",
            values: vec![pattern.clone(), pattern],
        });
    }

    if filters.only_new {
        clauses.push(FilterClause {
            sql: "notified = 0",
            values: vec![],
        });
    }

    if let Some(category) = &filters.category {
        clauses.push(FilterClause {
            sql: "category LIKE ?",
            values: vec![format!("%{category}%")],
        });
    }

    if let Some(location) = &filters.location {
        clauses.push(FilterClause {
            sql: "location LIKE ?",
            values: vec![format!("%{location}%")],
        });
    }

    clauses
}

/// Fetch every post matching the filters, up to `cap` candidates.
///
/// No ORDER BY on the recency column on purpose: `normalized_posted_at` can
/// be NULL for legacy rows, so recency ordering happens in memory over the
/// full candidate set (see `query::query_posts_at`). The cap bounds memory;
/// candidates beyond it are dropped newest-scraped-first.
pub async fn fetch_filtered_posts(
    pool: &SqlitePool,
    filters: &PostFilters,
    cap: i64,
) -> Result<Vec<Post>> {
    let clauses = build_filter_clauses(filters);

    let mut sql = String::from("SELECT * FROM posts");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        let fragments: Vec<&str> = clauses.iter().map(|c| c.sql).collect();
        sql.push_str(&fragments.join(" AND "));
    }
    sql.push_str(" ORDER BY id DESC LIMIT ?");

    let mut query = sqlx::query_as::<_, Post>(&sql);
    for clause in &clauses {
        for value in &clause.values {
            query = query.bind(value);
        }
    }
    query = query.bind(cap);

    query
        .fetch_all(pool)
        .await
        .context("Failed to fetch filtered posts")
}

// ========== Stats ==========

/// Total number of stored posts.
pub async fn count_posts(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")
}

/// Number of posts not yet notified about.
pub async fn count_unnotified_posts(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE notified = 0")
        .fetch_one(pool)
        .await
        .context("Failed to count unnotified posts")
}

/// Post counts per group, most active first.
pub async fn count_posts_by_group(pool: &SqlitePool) -> Result<Vec<GroupCount>> {
    sqlx::query_as(
        r#"
        SELECT group_name AS "group", COUNT(*) AS count
        FROM posts
        GROUP BY group_name
        ORDER BY count DESC, group_name ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to count posts by group")
}
