//! Whole-collection export and import
//!
//! A snapshot is a single JSON document holding every deck, card and review
//! log entry. Importing one replaces whatever the store held before.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::models::{to_millis, Deck, Flashcard, ReviewLog};
use super::storage::{FlashcardStorageError, FlashcardStore};

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid backup: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] FlashcardStorageError),

    #[error("Card {card_id} references missing deck {deck_id}")]
    OrphanCard { card_id: Uuid, deck_id: Uuid },

    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: Uuid },
}

pub type Result<T> = std::result::Result<T, BackupError>;

/// Point-in-time copy of a whole collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub decks: Vec<Deck>,
    pub cards: Vec<Flashcard>,
    pub reviews: Vec<ReviewLog>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub exported_at: DateTime<Utc>,
}

/// Counts reported after an import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub deck_count: usize,
    pub card_count: usize,
    pub review_count: usize,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check referential integrity before anything is written
    pub fn validate(&self) -> Result<()> {
        let mut deck_ids = HashSet::new();
        for deck in &self.decks {
            if !deck_ids.insert(deck.id) {
                return Err(BackupError::DuplicateId { kind: "deck", id: deck.id });
            }
        }

        let mut card_ids = HashSet::new();
        for card in &self.cards {
            if !card_ids.insert(card.id) {
                return Err(BackupError::DuplicateId { kind: "card", id: card.id });
            }
            if !deck_ids.contains(&card.deck_id) {
                return Err(BackupError::OrphanCard {
                    card_id: card.id,
                    deck_id: card.deck_id,
                });
            }
        }

        Ok(())
    }
}

/// Read every record from `store` into a snapshot
pub fn export_snapshot<S: FlashcardStore + ?Sized>(store: &S, now: DateTime<Utc>) -> Result<Snapshot> {
    let snapshot = Snapshot {
        decks: store.list_decks()?,
        cards: store.list_cards()?,
        reviews: store.list_reviews()?,
        exported_at: to_millis(now),
    };
    log::info!(
        "Exported {} decks, {} cards, {} reviews",
        snapshot.decks.len(),
        snapshot.cards.len(),
        snapshot.reviews.len()
    );
    Ok(snapshot)
}

/// Replace the contents of `store` with `snapshot`, all or nothing
pub fn import_snapshot<S: FlashcardStore + ?Sized>(store: &S, snapshot: Snapshot) -> Result<ImportSummary> {
    snapshot.validate()?;

    let cards: Vec<Flashcard> = snapshot
        .cards
        .iter()
        .map(|card| card.with_state(card.state.clone().normalized()))
        .collect();
    store.replace_all(&snapshot.decks, &cards, &snapshot.reviews)?;

    let summary = ImportSummary {
        deck_count: snapshot.decks.len(),
        card_count: snapshot.cards.len(),
        review_count: snapshot.reviews.len(),
    };
    log::info!(
        "Imported {} decks, {} cards, {} reviews",
        summary.deck_count,
        summary.card_count,
        summary.review_count
    );
    Ok(summary)
}

/// Export `store` to a JSON file
pub fn export_to_file<S: FlashcardStore + ?Sized>(store: &S, path: &Path, now: DateTime<Utc>) -> Result<Snapshot> {
    let snapshot = export_snapshot(store, now)?;
    fs::write(path, snapshot.to_json()?)?;
    Ok(snapshot)
}

/// Import a JSON file into `store`, replacing its contents
pub fn import_from_file<S: FlashcardStore + ?Sized>(store: &S, path: &Path) -> Result<ImportSummary> {
    let content = fs::read_to_string(path)?;
    let snapshot = Snapshot::from_json(&content)?;
    import_snapshot(store, snapshot)
}
