//! OpenAI-backed classifier.
//!
//! One chat-completions call per post, asking for a strict JSON object with
//! category, secondary categories, location and a small feature blob. The
//! request carries a hard timeout; every failure mode (network, non-2xx,
//! refusal, malformed JSON) is an error for the cascade to downgrade.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{keywords, AiClassification, Classifier, ClassifierError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClassifier {
    /// Build a classifier with the given key, model, and request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        })
    }

    /// Override the API base URL (test servers, proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_prompt(title: &str, text: &str) -> String {
        let categories = keywords::all_categories().join(", ");
        format!(
            "Analyze this group post and extract:\n\
             1. category (choose ONE): {categories}\n\
             2. secondary_categories: other applicable categories from the same list (may be empty)\n\
             3. location: city or area mentioned, or null if not specified\n\
             4. features: JSON object with urgency (urgent/normal/flexible), \
             price_mentioned (true/false), contact_method (pm/phone/comment/not_specified)\n\
             \n\
             Post title: {title}\n\
             Post text: {text}\n\
             \n\
             Respond with a single JSON object:\n\
             {{\"category\": \"...\", \"secondary_categories\": [], \"location\": \"...\", \"features\": {{}}}}"
        )
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ExtractedPayload {
    category: String,
    #[serde(default)]
    secondary_categories: Vec<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    features: serde_json::Value,
}

/// Models sometimes wrap JSON in a markdown code fence despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

fn parse_payload(content: &str) -> Result<AiClassification, ClassifierError> {
    let payload: ExtractedPayload = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| ClassifierError::MalformedResponse(format!("invalid JSON: {e}")))?;

    if payload.category.trim().is_empty() {
        return Err(ClassifierError::MalformedResponse(
            "empty category".to_string(),
        ));
    }

    // "Unknown" is the model's way of saying no location was mentioned.
    let location = payload
        .location
        .filter(|l| !l.trim().is_empty() && !l.eq_ignore_ascii_case("unknown"));

    Ok(AiClassification {
        category: payload.category,
        secondary_categories: payload.secondary_categories,
        location,
        features: payload.features,
    })
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, title: &str, text: &str) -> Result<AiClassification, ClassifierError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You extract structured information from group feed posts. \
                                Always respond with valid JSON only, no additional text.",
                },
                {
                    "role": "user",
                    "content": Self::build_prompt(title, text),
                }
            ],
            "temperature": 0.3,
            "max_tokens": 200,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api { status, body });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::MalformedResponse(format!("invalid envelope: {e}")))?;

        let content = chat
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| ClassifierError::MalformedResponse("no choices".to_string()))?;

        debug!(model = %self.model, "classifier responded");
        parse_payload(content)
    }
}
