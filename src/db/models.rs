use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Datetime storage format. SQLite has no native datetime type; instants are
/// stored as ISO-8601 text in this fixed layout so lexicographic and
/// chronological order agree.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One observed group-feed post, as stored.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    /// Externally assigned stable identifier; the sole identity guarantee.
    pub post_id: String,
    pub title: String,
    pub text: String,
    pub url: String,
    pub group_name: String,
    pub group_url: String,
    /// Timestamp exactly as scraped, preserved verbatim.
    pub raw_timestamp: String,
    /// Derived once from `raw_timestamp` at ingestion time. Nullable only for
    /// rows that predate timestamp normalization.
    pub normalized_posted_at: Option<String>,
    pub scraped_at: String,
    pub notified: bool,
    pub category: Option<String>,
    /// JSON array of category names.
    pub secondary_categories: String,
    pub location: Option<String>,
    /// JSON object of classifier-extracted features.
    pub classification_features: String,
    pub ai_processed: bool,
}

impl Post {
    /// The persisted normalized instant, if present and well-formed.
    #[must_use]
    pub fn posted_at(&self) -> Option<NaiveDateTime> {
        self.normalized_posted_at
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok())
    }

    /// Secondary categories as a list. Malformed stored JSON reads as empty.
    #[must_use]
    pub fn secondary_categories_list(&self) -> Vec<String> {
        serde_json::from_str(&self.secondary_categories).unwrap_or_default()
    }
}

/// A post record as produced by the external scraper collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPost {
    pub post_id: String,
    pub title: String,
    pub text: String,
    pub url: String,
    pub raw_timestamp: String,
    pub group_name: String,
    pub group_url: String,
}

/// Classification fields as persisted on a post row.
#[derive(Debug, Clone)]
pub struct ClassificationUpdate {
    pub category: String,
    /// JSON array text.
    pub secondary_categories: String,
    pub location: Option<String>,
    /// JSON object text.
    pub features: String,
}

/// Per-group post count for the stats endpoint.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupCount {
    pub group: String,
    pub count: i64,
}
