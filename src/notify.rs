//! Notification bookkeeping.
//!
//! Which posts to deliver, and how, is the external sender's business; this
//! module only tracks which posts have already triggered a notification and
//! offers the relevance keyword match the sender filters with.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::db::{self, Post};

/// Relevance keywords the notification sender matches against title/text.
/// Vocabulary of the monitored groups (Norwegian, plus common misspellings
/// without the special characters).
pub static RELEVANCE_KEYWORDS: &[&str] = &[
    "kjøre",
    "kjøring",
    "bil",
    "flytte",
    "flytting",
    "transport",
    "sjåfør",
    "levering",
    "hente",
    "frakt",
    "flyttejobb",
    "kjoring",
    "sjafor",
];

/// Mark a post as notified. Idempotent: marking an already-notified post is
/// a no-op. Returns whether a post with this `post_id` exists. There is no
/// un-notify operation.
///
/// # Errors
///
/// Returns an error on store failure.
pub async fn mark_notified(pool: &SqlitePool, post_id: &str) -> Result<bool> {
    db::set_notified(pool, post_id).await
}

/// A post is eligible for notification iff it has not been notified about.
/// Classification state is irrelevant to eligibility.
#[must_use]
pub fn is_eligible_for_notification(post: &Post) -> bool {
    !post.notified
}

/// Case-insensitive keyword match against title and text.
#[must_use]
pub fn post_matches_keywords(post: &Post, keywords: &[&str]) -> bool {
    let haystack = format!("{} {}", post.title, post.text).to_lowercase();
    keywords.iter().any(|kw| haystack.contains(&kw.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post(title: &str, text: &str, notified: bool) -> Post {
        Post {
            id: 1,
            post_id: "p1".to_string(),
            title: title.to_string(),
            text: text.to_string(),
            url: String::new(),
            group_name: String::new(),
            group_url: String::new(),
            raw_timestamp: "2h".to_string(),
            normalized_posted_at: None,
            scraped_at: "2024-03-10T12:00:00".to_string(),
            notified,
            category: None,
            secondary_categories: "[]".to_string(),
            location: None,
            classification_features: "{}".to_string(),
            ai_processed: false,
        }
    }

    #[test]
    fn eligibility_ignores_classification_state() {
        let post = sample_post("Trenger hjelp", "med flytting", false);
        assert!(is_eligible_for_notification(&post));

        let notified = sample_post("Trenger hjelp", "med flytting", true);
        assert!(!is_eligible_for_notification(&notified));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let post = sample_post("FLYTTING til Asker", "", false);
        assert!(post_matches_keywords(&post, RELEVANCE_KEYWORDS));

        let miss = sample_post("Selger sofa", "pen stand", false);
        assert!(!post_matches_keywords(&miss, RELEVANCE_KEYWORDS));
    }
}
