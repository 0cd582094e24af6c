//! The write path: create or update a post record from scraped input.
//!
//! Identity is the external `post_id`; the store's UNIQUE constraint is the
//! only dedup mechanism. Classification (an expensive external call) runs at
//! most once per post: the `ai_processed` flag gates re-classification, so a
//! re-scraped post is a cheap skip.

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, warn};

use crate::classify::{ClassificationCascade, ClassificationResult};
use crate::db::{
    self, ClassificationUpdate, Database, Post, ScrapedPost, DATETIME_FORMAT,
};
use crate::timestamp;

/// Outcome of one ingestion. Directly observable by callers and tests; the
/// cost-control contract lives in the distinction between
/// `ClassificationUpdated` and `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// First sighting: full record inserted and classified.
    Inserted,
    /// Known post that had never been (successfully) classified; only the
    /// classification fields changed.
    ClassificationUpdated,
    /// Known, already-classified post; no mutation, no classifier call.
    Skipped,
}

/// Counts for a batch of ingestions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub inserted: u64,
    pub classification_updated: u64,
    pub skipped: u64,
}

impl IngestStats {
    fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Inserted => self.inserted += 1,
            IngestOutcome::ClassificationUpdated => self.classification_updated += 1,
            IngestOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Owns post identity, dedup and classification gating.
pub struct PostRepository {
    db: Database,
    cascade: ClassificationCascade,
}

impl PostRepository {
    #[must_use]
    pub fn new(db: Database, cascade: ClassificationCascade) -> Self {
        Self { db, cascade }
    }

    #[must_use]
    pub const fn db(&self) -> &Database {
        &self.db
    }

    /// Ingest one scraped post, normalizing its timestamp against the
    /// current wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure; classifier failures degrade
    /// to the keyword fallback inside the cascade.
    pub async fn ingest(&self, scraped: &ScrapedPost) -> Result<IngestOutcome> {
        self.ingest_at(scraped, Local::now().naive_local()).await
    }

    /// [`PostRepository::ingest`] with an explicit reference instant.
    ///
    /// Timestamp normalization happens here, exactly once, and is persisted;
    /// relative formats ("7h") drift in meaning with wall-clock time, so
    /// re-deriving on read would corrupt ordering.
    pub async fn ingest_at(
        &self,
        scraped: &ScrapedPost,
        now: NaiveDateTime,
    ) -> Result<IngestOutcome> {
        if let Some(existing) = db::get_post_by_post_id(self.db.pool(), &scraped.post_id).await? {
            return self.reconcile_existing(&existing).await;
        }

        let normalized = timestamp::normalize(&scraped.raw_timestamp, now);
        if normalized == timestamp::sentinel() {
            // Data-quality event, not an error: the post still lands, it
            // just sorts to the bottom of the feed.
            warn!(
                post_id = %scraped.post_id,
                raw = %scraped.raw_timestamp,
                "Unrecognized timestamp format, using oldest sentinel"
            );
        }

        let inserted = db::try_insert_post(
            self.db.pool(),
            scraped,
            &normalized.format(DATETIME_FORMAT).to_string(),
            &now.format(DATETIME_FORMAT).to_string(),
        )
        .await?;

        if inserted.is_none() {
            // Lost an insert race on post_id. The winner's record stands;
            // fall through to the update/skip branch.
            debug!(post_id = %scraped.post_id, "Insert race lost, reconciling");
            let Some(existing) =
                db::get_post_by_post_id(self.db.pool(), &scraped.post_id).await?
            else {
                anyhow::bail!(
                    "post {} vanished between conflicting insert and re-fetch",
                    scraped.post_id
                );
            };
            return self.reconcile_existing(&existing).await;
        }

        self.classify_and_store(&scraped.post_id, &scraped.title, &scraped.text)
            .await?;
        Ok(IngestOutcome::Inserted)
    }

    /// Ingest a batch, returning per-outcome counts.
    ///
    /// # Errors
    ///
    /// Returns the first store error; earlier posts in the batch stay ingested.
    pub async fn ingest_batch(&self, posts: &[ScrapedPost]) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        for scraped in posts {
            stats.record(self.ingest(scraped).await?);
        }
        Ok(stats)
    }

    async fn reconcile_existing(&self, existing: &Post) -> Result<IngestOutcome> {
        if existing.ai_processed {
            return Ok(IngestOutcome::Skipped);
        }

        // Known post that was never classified (e.g. an earlier crash between
        // insert and classification). Classification fields only; content,
        // provenance, timestamps and the notified flag stay untouched.
        self.classify_and_store(&existing.post_id, &existing.title, &existing.text)
            .await?;
        Ok(IngestOutcome::ClassificationUpdated)
    }

    async fn classify_and_store(&self, post_id: &str, title: &str, text: &str) -> Result<()> {
        let update = match self.cascade.classify(title, text).await {
            ClassificationResult::AiSuccess(ai) => ClassificationUpdate {
                category: ai.category,
                secondary_categories: serde_json::to_string(&ai.secondary_categories)?,
                location: ai.location,
                features: serde_json::to_string(&ai.features)?,
            },
            ClassificationResult::KeywordFallback { category } => ClassificationUpdate {
                category,
                secondary_categories: "[]".to_string(),
                location: None,
                features: "{}".to_string(),
            },
            ClassificationResult::Unclassified => {
                // ai_processed implies a non-null category, so even this
                // (unreachable via the current cascade) records the default.
                ClassificationUpdate {
                    category: crate::classify::keywords::DEFAULT_CATEGORY.to_string(),
                    secondary_categories: "[]".to_string(),
                    location: None,
                    features: "{}".to_string(),
                }
            }
        };

        db::set_classification(self.db.pool(), post_id, &update).await
    }
}
