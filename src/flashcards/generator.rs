//! Flashcard generation from free text via a language model
//!
//! The generator only proposes card content. Its output is treated as
//! untrusted text: blank pairs are dropped and the result is capped at the
//! requested count. Generated cards always start from a fresh scheduling
//! state.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use super::config::{GeneratorConfig, SchedulerConfig};
use super::models::Flashcard;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API key is missing. Set generator.api_key or GEMINI_API_KEY.")]
    MissingApiKey,

    #[error("Nothing to generate from: input text is empty")]
    EmptyInput,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("No response text from model")]
    EmptyResponse,

    #[error("Malformed model output: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GenerationError>;

/// One proposed front/back pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCard {
    pub front: String,
    pub back: String,
}

/// Turns source text into proposed flashcards
#[async_trait]
pub trait CardGenerator: Send + Sync {
    async fn generate(&self, text: &str, count: usize) -> Result<Vec<GeneratedCard>>;
}

/// Gemini `generateContent` client
pub struct GeminiGenerator {
    client: Client,
    config: GeneratorConfig,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or(GenerationError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body(&self, text: &str, count: usize) -> serde_json::Value {
        let prompt = build_prompt(text, count, self.config.max_input_chars);
        json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "front": { "type": "STRING", "description": "Question or front of card" },
                            "back": { "type": "STRING", "description": "Answer or back of card" }
                        },
                        "required": ["front", "back"]
                    }
                }
            }
        })
    }
}

#[async_trait]
impl CardGenerator for GeminiGenerator {
    async fn generate(&self, text: &str, count: usize) -> Result<Vec<GeneratedCard>> {
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyInput);
        }

        log::info!("Requesting {} cards from {}", count, self.config.model);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(text, count))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().await.unwrap_or_default();
            log::warn!("Generation request failed: {} {}", status, message);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let text = response_text(&body).ok_or(GenerationError::EmptyResponse)?;
        let cards = parse_generated_cards(text, count)?;
        log::debug!("Model returned {} usable cards", cards.len());
        Ok(cards)
    }
}

/// Instructions sent with the source text
pub fn build_prompt(text: &str, count: usize, max_chars: usize) -> String {
    format!(
        "You are an expert tutor. Create {count} high-quality flashcards from the provided text.\n\
         The cards should follow the \"minimum information principle\" - simple, atomic questions.\n\
         Return ONLY a JSON array.\n\
         Text: \"{text}\"",
        count = count,
        text = truncate_chars(text, max_chars)
    )
}

/// First `max` characters of `text`, never splitting a character
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Text of the first candidate part in a `generateContent` response
fn response_text(body: &serde_json::Value) -> Option<&str> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .filter(|t| !t.trim().is_empty())
}

/// Parse the model's JSON array, keeping at most `count` non-blank pairs
pub fn parse_generated_cards(text: &str, count: usize) -> Result<Vec<GeneratedCard>> {
    let raw: Vec<GeneratedCard> = serde_json::from_str(text.trim())?;
    Ok(raw
        .into_iter()
        .map(|c| GeneratedCard {
            front: c.front.trim().to_string(),
            back: c.back.trim().to_string(),
        })
        .filter(|c| !c.front.is_empty() && !c.back.is_empty())
        .take(count)
        .collect())
}

/// New cards in `deck_id` for each generated pair
pub fn cards_from_generated(
    deck_id: Uuid,
    generated: Vec<GeneratedCard>,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> Vec<Flashcard> {
    generated
        .into_iter()
        .map(|g| Flashcard::new(deck_id, g.front, g.back, config, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::models::{to_millis, CardStatus};

    struct CannedGenerator(Vec<GeneratedCard>);

    #[async_trait]
    impl CardGenerator for CannedGenerator {
        async fn generate(&self, _text: &str, count: usize) -> Result<Vec<GeneratedCard>> {
            Ok(self.0.iter().take(count).cloned().collect())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl CardGenerator for FailingGenerator {
        async fn generate(&self, _text: &str, _count: usize) -> Result<Vec<GeneratedCard>> {
            Err(GenerationError::EmptyResponse)
        }
    }

    fn pair(front: &str, back: &str) -> GeneratedCard {
        GeneratedCard {
            front: front.to_string(),
            back: back.to_string(),
        }
    }

    #[test]
    fn test_parse_drops_blank_and_caps_count() {
        let text = r#"[
            {"front": " What is H2O? ", "back": "Water"},
            {"front": "", "back": "orphan answer"},
            {"front": "Boiling point?", "back": "100 C"},
            {"front": "Extra", "back": "Card"}
        ]"#;
        let cards = parse_generated_cards(text, 2).unwrap();
        assert_eq!(cards, vec![pair("What is H2O?", "Water"), pair("Boiling point?", "100 C")]);
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(matches!(
            parse_generated_cards(r#"{"front": "a"}"#, 5),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn test_response_text_extraction() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "[{\"front\":\"a\",\"back\":\"b\"}]" }] }
            }]
        });
        assert_eq!(response_text(&body), Some("[{\"front\":\"a\",\"back\":\"b\"}]"));
        assert_eq!(response_text(&json!({ "candidates": [] })), None);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_prompt_includes_count_and_truncated_text() {
        let prompt = build_prompt("abcdef", 3, 4);
        assert!(prompt.contains("Create 3 high-quality flashcards"));
        assert!(prompt.contains("Text: \"abcd\""));
        assert!(!prompt.contains("abcde"));
    }

    #[test]
    fn test_missing_api_key() {
        std::env::remove_var("GEMINI_API_KEY");
        let config = GeneratorConfig::default();
        assert!(matches!(
            GeminiGenerator::new(config),
            Err(GenerationError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn test_generated_cards_start_fresh() {
        let generator = CannedGenerator(vec![pair("q1", "a1"), pair("q2", "a2"), pair("q3", "a3")]);
        let generated = generator.generate("notes", 2).await.unwrap();

        let deck_id = Uuid::new_v4();
        let now = Utc::now();
        let cards = cards_from_generated(deck_id, generated, &SchedulerConfig::default(), now);

        assert_eq!(cards.len(), 2);
        for card in &cards {
            assert_eq!(card.deck_id, deck_id);
            assert_eq!(card.state.status, CardStatus::New);
            assert_eq!(card.state.due_date, to_millis(now));
        }
    }

    #[tokio::test]
    async fn test_generator_failure_surfaces() {
        let generator: Box<dyn CardGenerator> = Box::new(FailingGenerator);
        assert!(generator.generate("notes", 5).await.is_err());
    }
}
