//! Topic/location classification for ingested posts.
//!
//! Primary path is an external AI classifier; when it is unavailable, errors,
//! times out, or is intentionally not configured, an ordered keyword rule
//! table decides instead. The cascade never fails: any classifier error
//! downgrades to the fallback silently (logged, not surfaced).

pub mod keywords;
mod openai;

pub use openai::OpenAiClassifier;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Successful output of the external classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiClassification {
    pub category: String,
    #[serde(default)]
    pub secondary_categories: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub features: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classifier returned status {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("classifier returned malformed payload: {0}")]
    MalformedResponse(String),
}

/// External classifier collaborator. Implementations are expected to bound
/// their own I/O (request timeout); a timeout surfaces as an error and the
/// cascade treats it like any other failure.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, title: &str, text: &str) -> Result<AiClassification, ClassifierError>;
}

/// Outcome of one classification attempt. Callers must handle all three:
/// the distinction between an authoritative AI answer and a keyword guess is
/// part of the stored record's provenance.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationResult {
    AiSuccess(AiClassification),
    KeywordFallback { category: String },
    /// Reserved for a fallback that finds no category. The keyword table
    /// terminates in a default, so the cascade never constructs this today.
    Unclassified,
}

/// AI-first classification with deterministic keyword fallback.
pub struct ClassificationCascade {
    classifier: Option<Arc<dyn Classifier>>,
}

impl ClassificationCascade {
    #[must_use]
    pub fn new(classifier: Option<Arc<dyn Classifier>>) -> Self {
        Self { classifier }
    }

    /// Cascade with no external classifier: every post goes through the
    /// keyword rules.
    #[must_use]
    pub fn keyword_only() -> Self {
        Self::new(None)
    }

    /// Classify a post. Never errors; a failing classifier downgrades to the
    /// keyword rules.
    pub async fn classify(&self, title: &str, text: &str) -> ClassificationResult {
        if let Some(classifier) = &self.classifier {
            match classifier.classify(title, text).await {
                Ok(ai) => return ClassificationResult::AiSuccess(ai),
                Err(e) => {
                    warn!("AI classification failed, using keyword fallback: {e:#}");
                }
            }
        }

        let haystack = format!("{title} {text}").to_lowercase();
        let category = keywords::match_keywords(&haystack).unwrap_or_else(|| {
            debug!("no keyword rule matched, defaulting category");
            keywords::DEFAULT_CATEGORY
        });

        ClassificationResult::KeywordFallback {
            category: category.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingClassifier;

    #[async_trait]
    impl Classifier for FailingClassifier {
        async fn classify(
            &self,
            _title: &str,
            _text: &str,
        ) -> Result<AiClassification, ClassifierError> {
            Err(ClassifierError::MalformedResponse("boom".to_string()))
        }
    }

    struct EchoClassifier;

    #[async_trait]
    impl Classifier for EchoClassifier {
        async fn classify(
            &self,
            title: &str,
            _text: &str,
        ) -> Result<AiClassification, ClassifierError> {
            Ok(AiClassification {
                category: title.to_string(),
                secondary_categories: vec![],
                location: Some("Oslo".to_string()),
                features: serde_json::json!({}),
            })
        }
    }

    #[tokio::test]
    async fn ai_success_is_authoritative() {
        let cascade = ClassificationCascade::new(Some(Arc::new(EchoClassifier)));
        let result = cascade.classify("Plumbing", "flyttejobb i helgen").await;
        // The AI answer wins even though the keywords say Transport / Moving.
        match result {
            ClassificationResult::AiSuccess(ai) => {
                assert_eq!(ai.category, "Plumbing");
                assert_eq!(ai.location.as_deref(), Some("Oslo"));
            }
            other => panic!("expected AiSuccess, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn classifier_error_downgrades_to_keywords() {
        let cascade = ClassificationCascade::new(Some(Arc::new(FailingClassifier)));
        let result = cascade.classify("Trenger hjelp", "male stue, maling inkludert").await;
        assert_eq!(
            result,
            ClassificationResult::KeywordFallback {
                category: "Painting / Renovation".to_string()
            }
        );
    }

    #[tokio::test]
    async fn no_classifier_goes_straight_to_keywords() {
        let cascade = ClassificationCascade::keyword_only();
        let result = cascade.classify("Billetter", "selger to billetter").await;
        assert_eq!(
            result,
            ClassificationResult::KeywordFallback {
                category: "Other".to_string()
            }
        );
    }

    #[tokio::test]
    async fn precedence_is_deterministic_for_multi_category_text() {
        let cascade = ClassificationCascade::keyword_only();
        let a = cascade.classify("", "vask av leilighet etter flytting").await;
        let b = cascade.classify("", "flytting, deretter vask").await;
        let expected = ClassificationResult::KeywordFallback {
            category: "Transport / Moving".to_string(),
        };
        assert_eq!(a, expected);
        assert_eq!(b, expected);
    }
}
