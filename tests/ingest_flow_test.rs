//! Integration tests for the ingestion path: dedup by post_id,
//! classification gating, and race fallthrough.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use group_feed_monitor::classify::{
    AiClassification, ClassificationCascade, Classifier, ClassifierError,
};
use group_feed_monitor::db::{get_post_by_post_id, try_insert_post, Database, ScrapedPost};
use group_feed_monitor::ingest::{IngestOutcome, PostRepository};
use tempfile::TempDir;

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn reference_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn scraped(post_id: &str, title: &str, text: &str, raw_timestamp: &str) -> ScrapedPost {
    ScrapedPost {
        post_id: post_id.to_string(),
        title: title.to_string(),
        text: text.to_string(),
        url: format!("https://example.com/groups/1/posts/{post_id}"),
        raw_timestamp: raw_timestamp.to_string(),
        group_name: "Oslo småjobber".to_string(),
        group_url: "https://example.com/groups/1".to_string(),
    }
}

/// Classifier that counts invocations and returns a fixed answer.
struct CountingClassifier {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Classifier for CountingClassifier {
    async fn classify(
        &self,
        _title: &str,
        _text: &str,
    ) -> Result<AiClassification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AiClassification {
            category: "Transport / Moving".to_string(),
            secondary_categories: vec!["Manual Labor".to_string()],
            location: Some("Oslo".to_string()),
            features: serde_json::json!({"urgency": "normal"}),
        })
    }
}

fn counting_repo(db: Database) -> (PostRepository, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier = CountingClassifier {
        calls: Arc::clone(&calls),
    };
    let cascade = ClassificationCascade::new(Some(Arc::new(classifier)));
    (PostRepository::new(db, cascade), calls)
}

#[tokio::test]
async fn first_ingest_inserts_and_classifies() {
    let (db, _temp_dir) = setup_db().await;
    let (repo, calls) = counting_repo(db.clone());

    let outcome = repo
        .ingest_at(&scraped("p1", "Flyttehjelp", "Trenger hjelp i helgen", "2h"), reference_now())
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Inserted);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let post = get_post_by_post_id(db.pool(), "p1")
        .await
        .unwrap()
        .expect("post not found");
    assert!(post.ai_processed);
    assert!(!post.notified);
    assert_eq!(post.category.as_deref(), Some("Transport / Moving"));
    assert_eq!(post.location.as_deref(), Some("Oslo"));
    assert_eq!(post.secondary_categories_list(), vec!["Manual Labor"]);
    assert_eq!(post.raw_timestamp, "2h");
    // "2h" before 2024-03-10T12:00 is 10:00 the same day
    assert_eq!(
        post.normalized_posted_at.as_deref(),
        Some("2024-03-10T10:00:00")
    );
}

#[tokio::test]
async fn duplicate_ingest_is_a_skip_and_mutates_nothing() {
    let (db, _temp_dir) = setup_db().await;
    let (repo, calls) = counting_repo(db.clone());

    repo.ingest_at(&scraped("p1", "Original title", "original text", "2h"), reference_now())
        .await
        .unwrap();

    // Same post_id, different content: identity wins, content is immutable.
    let outcome = repo
        .ingest_at(
            &scraped("p1", "Edited title", "edited text", "5h"),
            reference_now(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Skipped);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no second classifier call");

    let post = get_post_by_post_id(db.pool(), "p1").await.unwrap().unwrap();
    assert_eq!(post.title, "Original title");
    assert_eq!(post.text, "original text");
    assert_eq!(post.raw_timestamp, "2h");
    assert!(!post.notified);
}

#[tokio::test]
async fn third_ingest_is_a_verified_noop() {
    let (db, _temp_dir) = setup_db().await;
    let (repo, calls) = counting_repo(db.clone());

    let post = scraped("p1", "Flyttehjelp", "trenger hjelp", "2h");
    repo.ingest_at(&post, reference_now()).await.unwrap();
    repo.ingest_at(&post, reference_now()).await.unwrap();

    let before = get_post_by_post_id(db.pool(), "p1").await.unwrap().unwrap();
    let outcome = repo.ingest_at(&post, reference_now()).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Skipped);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let after = get_post_by_post_id(db.pool(), "p1").await.unwrap().unwrap();
    assert_eq!(before.title, after.title);
    assert_eq!(before.category, after.category);
    assert_eq!(before.normalized_posted_at, after.normalized_posted_at);
    assert_eq!(before.scraped_at, after.scraped_at);
}

#[tokio::test]
async fn unclassified_existing_row_gets_classification_only() {
    let (db, _temp_dir) = setup_db().await;

    // Seed a row the way a crash between insert and classification would
    // leave it: present, ai_processed = false.
    let raw = scraped("p1", "Trenger rørlegger", "lekkasje under vasken", "3h");
    try_insert_post(db.pool(), &raw, "2024-03-10T09:00:00", "2024-03-10T12:00:00")
        .await
        .unwrap()
        .expect("insert should succeed");

    let (repo, calls) = counting_repo(db.clone());
    let outcome = repo
        .ingest_at(
            &scraped("p1", "Different title", "different text", "9h"),
            reference_now(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::ClassificationUpdated);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let post = get_post_by_post_id(db.pool(), "p1").await.unwrap().unwrap();
    // Classification fields updated...
    assert!(post.ai_processed);
    assert_eq!(post.category.as_deref(), Some("Transport / Moving"));
    // ...but content and timestamps kept from the original insert.
    assert_eq!(post.title, "Trenger rørlegger");
    assert_eq!(post.raw_timestamp, "3h");
    assert_eq!(post.normalized_posted_at.as_deref(), Some("2024-03-10T09:00:00"));
}

#[tokio::test]
async fn insert_conflict_returns_none_instead_of_erroring() {
    let (db, _temp_dir) = setup_db().await;

    let raw = scraped("p1", "a", "b", "2h");
    let first = try_insert_post(db.pool(), &raw, "2024-03-10T10:00:00", "2024-03-10T12:00:00")
        .await
        .unwrap();
    assert!(first.is_some());

    // The raced duplicate observes "already exists", not an error.
    let second = try_insert_post(db.pool(), &raw, "2024-03-10T10:00:00", "2024-03-10T12:00:00")
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn classifier_failure_falls_back_to_keywords() {
    struct AlwaysFails;

    #[async_trait]
    impl Classifier for AlwaysFails {
        async fn classify(
            &self,
            _title: &str,
            _text: &str,
        ) -> Result<AiClassification, ClassifierError> {
            Err(ClassifierError::MalformedResponse("down".to_string()))
        }
    }

    let (db, _temp_dir) = setup_db().await;
    let cascade = ClassificationCascade::new(Some(Arc::new(AlwaysFails)));
    let repo = PostRepository::new(db.clone(), cascade);

    let outcome = repo
        .ingest_at(
            &scraped("p1", "Maling av stue", "oppussing før jul", "4h"),
            reference_now(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Inserted);

    let post = get_post_by_post_id(db.pool(), "p1").await.unwrap().unwrap();
    // A fallback classification still counts as a processing attempt.
    assert!(post.ai_processed);
    assert_eq!(post.category.as_deref(), Some("Painting / Renovation"));
    assert_eq!(post.location, None);
}

#[tokio::test]
async fn unparseable_timestamp_still_ingests_with_sentinel() {
    let (db, _temp_dir) = setup_db().await;
    let (repo, _calls) = counting_repo(db.clone());

    let outcome = repo
        .ingest_at(&scraped("p1", "t", "x", "sometime last week?"), reference_now())
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Inserted);

    let post = get_post_by_post_id(db.pool(), "p1").await.unwrap().unwrap();
    assert_eq!(
        post.normalized_posted_at.as_deref(),
        Some("1970-01-01T00:00:00"),
        "unknown formats persist the oldest sentinel"
    );
}

#[tokio::test]
async fn batch_ingest_counts_outcomes() {
    let (db, _temp_dir) = setup_db().await;
    let (repo, _calls) = counting_repo(db.clone());

    let posts = vec![
        scraped("p1", "a", "x", "1h"),
        scraped("p2", "b", "y", "2h"),
        scraped("p1", "a", "x", "1h"),
    ];
    let stats = repo.ingest_batch(&posts).await.unwrap();
    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.classification_updated, 0);
    assert_eq!(stats.skipped, 1);
}
