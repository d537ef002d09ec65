//! Data models for the flashcard system

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::algorithm::MIN_EASE;
use super::config::SchedulerConfig;

/// `t` without its sub-millisecond part.
///
/// Records store instants as epoch milliseconds, so every instant that ends
/// up in a record passes through here first.
pub fn to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(Duration::milliseconds(1)).unwrap_or(t)
}

/// A deck is a named collection of flashcards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hex code for the deck's theme color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Deck {
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        let now = to_millis(now);
        Self {
            id: Uuid::new_v4(),
            name,
            description: None,
            color: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A deck together with counts derived from its cards
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSummary {
    #[serde(flatten)]
    pub deck: Deck,
    pub card_count: usize,
    pub due_count: usize,
    pub new_count: usize,
}

impl DeckSummary {
    pub fn from_cards(deck: Deck, cards: &[Flashcard], now: DateTime<Utc>) -> Self {
        Self {
            deck,
            card_count: cards.len(),
            due_count: cards.iter().filter(|c| c.state.due_date <= now).count(),
            new_count: cards
                .iter()
                .filter(|c| c.state.status == CardStatus::New)
                .count(),
        }
    }
}

/// Lifecycle status of a card in the spaced repetition system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    /// Never reviewed
    New,
    /// Walking the learning-step ladder
    Learning,
    /// Graduated; intervals measured in days
    Review,
    /// Failed after graduating
    Relearning,
}

impl Default for CardStatus {
    fn default() -> Self {
        Self::New
    }
}

impl CardStatus {
    /// Statuses that schedule by learning steps rather than by interval
    pub fn is_learning_phase(self) -> bool {
        matches!(self, Self::New | Self::Learning | Self::Relearning)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recall quality reported by the user, ordered from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again = 0,
    Hard = 1,
    Good = 2,
    Easy = 3,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rating code or name outside the four known variants
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid rating: {0}")]
pub struct InvalidRating(pub String);

impl TryFrom<u8> for Rating {
    type Error = InvalidRating;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Again),
            1 => Ok(Self::Hard),
            2 => Ok(Self::Good),
            3 => Ok(Self::Easy),
            other => Err(InvalidRating(other.to_string())),
        }
    }
}

/// Accepts the lowercase names, their first letters and the numeric codes
/// `0..=3` used by `TryFrom<u8>`.
impl FromStr for Rating {
    type Err = InvalidRating;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_lowercase();
        match input.as_str() {
            "again" | "a" => Ok(Self::Again),
            "hard" | "h" => Ok(Self::Hard),
            "good" | "g" => Ok(Self::Good),
            "easy" | "e" => Ok(Self::Easy),
            _ => input
                .parse::<u8>()
                .map_err(|_| InvalidRating(s.to_string()))
                .and_then(Self::try_from),
        }
    }
}

/// Scheduling state for a card. Owned and mutated only by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardState {
    /// Retention-ease multiplier, never below 1.3
    pub ease: f64,
    /// Days until the next review once in the review phase
    pub interval: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub due_date: DateTime<Utc>,
    pub status: CardStatus,
    /// Index into the learning-step ladder
    #[serde(default)]
    pub step: u32,
}

impl CardState {
    /// Fresh state for a card that has never been reviewed
    pub fn new(config: &SchedulerConfig, now: DateTime<Utc>) -> Self {
        Self {
            ease: config.default_ease,
            interval: 0,
            due_date: to_millis(now),
            status: CardStatus::New,
            step: 0,
        }
    }

    /// Restore the ease floor on state read from outside the scheduler
    pub fn normalized(mut self) -> Self {
        if self.ease.is_nan() || self.ease < MIN_EASE {
            self.ease = MIN_EASE;
        }
        self
    }
}

/// A flashcard with question (front), answer (back) and its scheduling state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: CardState,
}

impl Flashcard {
    pub fn new(
        deck_id: Uuid,
        front: String,
        back: String,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            deck_id,
            front,
            back,
            tags: Vec::new(),
            created_at: to_millis(now),
            state: CardState::new(config, now),
        }
    }

    /// Copy of this card carrying a new scheduling state
    pub fn with_state(&self, state: CardState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }
}

/// Split a comma-separated tag string, dropping blanks
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// A record of a single rating applied to a card. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub id: Uuid,
    pub card_id: Uuid,
    pub rating: Rating,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub reviewed_at: DateTime<Utc>,
    /// Milliseconds spent on the card, 0 when not measured
    #[serde(default, rename = "timeTaken")]
    pub time_taken_ms: u64,
}

impl ReviewLog {
    pub fn new(card_id: Uuid, rating: Rating, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_id,
            rating,
            reviewed_at: to_millis(reviewed_at),
            time_taken_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rating_order() {
        assert!(Rating::Again < Rating::Hard);
        assert!(Rating::Hard < Rating::Good);
        assert!(Rating::Good < Rating::Easy);
    }

    #[test]
    fn test_rating_from_code() {
        assert_eq!(Rating::try_from(0u8), Ok(Rating::Again));
        assert_eq!(Rating::try_from(3u8), Ok(Rating::Easy));
        assert!(Rating::try_from(4u8).is_err());
    }

    #[test]
    fn test_rating_from_str() {
        assert_eq!("Good".parse::<Rating>(), Ok(Rating::Good));
        assert_eq!("e".parse::<Rating>(), Ok(Rating::Easy));
        assert!("perfect".parse::<Rating>().is_err());
    }

    #[test]
    fn test_numeric_codes_agree() {
        for code in 0u8..=3 {
            assert_eq!(code.to_string().parse::<Rating>(), Rating::try_from(code));
        }
        assert_eq!("0".parse::<Rating>(), Ok(Rating::Again));
        assert_eq!("3".parse::<Rating>(), Ok(Rating::Easy));
        assert!("4".parse::<Rating>().is_err());
    }

    #[test]
    fn test_new_card_defaults() {
        let now = Utc::now();
        let card = Flashcard::new(
            Uuid::new_v4(),
            "Q".to_string(),
            "A".to_string(),
            &SchedulerConfig::default(),
            now,
        );
        assert_eq!(card.state.status, CardStatus::New);
        assert_eq!(card.state.ease, 2.5);
        assert_eq!(card.state.interval, 0);
        assert_eq!(card.state.step, 0);
        assert_eq!(card.state.due_date, to_millis(now));
        assert_eq!(card.created_at, card.state.due_date);
    }

    #[test]
    fn test_to_millis_drops_sub_millisecond_part() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            + Duration::nanoseconds(158_081_085);
        let truncated = to_millis(t);
        assert_eq!(truncated.timestamp_millis(), t.timestamp_millis());
        assert_eq!(truncated.timestamp_subsec_nanos(), 158_000_000);
        assert_eq!(to_millis(truncated), truncated);
    }

    #[test]
    fn test_new_records_survive_json_unchanged() {
        let now = Utc::now();
        let deck = Deck::new("Round trip".to_string(), now);
        let card = Flashcard::new(deck.id, "Q".into(), "A".into(), &SchedulerConfig::default(), now);
        let log = ReviewLog::new(card.id, Rating::Good, now);

        let deck_back: Deck = serde_json::from_str(&serde_json::to_string(&deck).unwrap()).unwrap();
        let card_back: Flashcard = serde_json::from_str(&serde_json::to_string(&card).unwrap()).unwrap();
        let log_back: ReviewLog = serde_json::from_str(&serde_json::to_string(&log).unwrap()).unwrap();
        assert_eq!(deck_back, deck);
        assert_eq!(card_back, card);
        assert_eq!(log_back, log);
    }

    #[test]
    fn test_card_wire_format_is_flat() {
        let card = Flashcard::new(
            Uuid::new_v4(),
            "Q".to_string(),
            "A".to_string(),
            &SchedulerConfig::default(),
            Utc::now(),
        );
        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["status"], "new");
        assert_eq!(value["ease"], 2.5);
        assert!(value["dueDate"].is_i64());
        assert!(value["deckId"].is_string());
        assert!(value.get("state").is_none());
    }

    #[test]
    fn test_card_reads_web_backup_record() {
        let json = r#"{
            "id": "0b6f7c1e-5d39-4a5e-9f55-2d8e7bfae001",
            "deckId": "0b6f7c1e-5d39-4a5e-9f55-2d8e7bfae002",
            "front": "Capital of France?",
            "back": "Paris",
            "tags": ["geo"],
            "createdAt": 1700000000000,
            "ease": 2.35,
            "interval": 12,
            "dueDate": 1700086400000,
            "status": "review",
            "step": 0
        }"#;
        let card: Flashcard = serde_json::from_str(json).unwrap();
        assert_eq!(card.state.status, CardStatus::Review);
        assert_eq!(card.state.interval, 12);
        assert_eq!(card.tags, vec!["geo".to_string()]);
        assert_eq!(card.state.due_date.timestamp_millis(), 1_700_086_400_000);
    }

    #[test]
    fn test_normalized_clamps_ease() {
        let state = CardState {
            ease: 0.9,
            interval: 3,
            due_date: Utc::now(),
            status: CardStatus::Review,
            step: 0,
        };
        assert_eq!(state.normalized().ease, MIN_EASE);
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(" geo, ,capitals ,"), vec!["geo", "capitals"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_deck_summary_counts() {
        let now = Utc::now();
        let config = SchedulerConfig::default();
        let deck = Deck::new("Spanish".to_string(), now);
        let fresh = Flashcard::new(deck.id, "a".into(), "b".into(), &config, now);
        let mut later = Flashcard::new(deck.id, "c".into(), "d".into(), &config, now);
        later.state.status = CardStatus::Review;
        later.state.due_date = now + Duration::days(2);

        let summary = DeckSummary::from_cards(deck, &[fresh, later], now);
        assert_eq!(summary.card_count, 2);
        assert_eq!(summary.due_count, 1);
        assert_eq!(summary.new_count, 1);
    }

    #[test]
    fn test_review_log_wire_format() {
        let log = ReviewLog::new(Uuid::new_v4(), Rating::Hard, Utc::now());
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["rating"], "hard");
        assert_eq!(value["timeTaken"], 0);
        assert!(value["reviewedAt"].is_i64());
    }
}
