//! Storage operations for flashcards
//!
//! Directory structure under the data directory:
//! ```text
//! flashcards/
//! ├── decks.json           # Array of all decks
//! ├── cards/
//! │   └── {card-id}.json   # Individual card files, scheduling state inline
//! └── reviews.jsonl        # Append-only review log
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use super::models::{Deck, Flashcard, ReviewLog};

#[derive(Error, Debug)]
pub enum FlashcardStorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Deck not found: {0}")]
    DeckNotFound(Uuid),

    #[error("Card not found: {0}")]
    CardNotFound(Uuid),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, FlashcardStorageError>;

/// Record store the review core reads from and writes to.
///
/// A `put` that returns `Ok` must be visible to every later read through the
/// same store.
pub trait FlashcardStore {
    fn list_decks(&self) -> Result<Vec<Deck>>;
    fn get_deck(&self, deck_id: Uuid) -> Result<Option<Deck>>;
    fn put_deck(&self, deck: &Deck) -> Result<()>;
    /// Remove a deck and every card that belongs to it
    fn delete_deck(&self, deck_id: Uuid) -> Result<()>;

    fn list_cards(&self) -> Result<Vec<Flashcard>>;
    fn get_card(&self, card_id: Uuid) -> Result<Option<Flashcard>>;
    /// Index query: all cards owned by a deck
    fn cards_by_deck(&self, deck_id: Uuid) -> Result<Vec<Flashcard>>;
    fn put_card(&self, card: &Flashcard) -> Result<()>;
    fn delete_card(&self, card_id: Uuid) -> Result<()>;

    fn append_review(&self, review: &ReviewLog) -> Result<()>;
    fn list_reviews(&self) -> Result<Vec<ReviewLog>>;

    /// Drop every deck, card and review
    fn clear(&self) -> Result<()>;

    /// Replace the whole collection. On error the previous contents are
    /// left in place.
    fn replace_all(&self, decks: &[Deck], cards: &[Flashcard], reviews: &[ReviewLog]) -> Result<()>;

    /// Get a deck or fail with `DeckNotFound`
    fn require_deck(&self, deck_id: Uuid) -> Result<Deck> {
        self.get_deck(deck_id)?
            .ok_or(FlashcardStorageError::DeckNotFound(deck_id))
    }

    /// Get a card or fail with `CardNotFound`
    fn require_card(&self, card_id: Uuid) -> Result<Flashcard> {
        self.get_card(card_id)?
            .ok_or(FlashcardStorageError::CardNotFound(card_id))
    }
}

/// File-backed flashcard store
pub struct FlashcardStorage {
    /// Base path (e.g., ~/.local/share/flashdeck)
    base_path: PathBuf,
}

impl FlashcardStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("flashdeck"))
            .ok_or(FlashcardStorageError::DataDirNotFound)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn flashcards_dir(&self) -> PathBuf {
        self.base_path.join("flashcards")
    }

    fn cards_dir(&self) -> PathBuf {
        self.flashcards_dir().join("cards")
    }

    fn decks_path(&self) -> PathBuf {
        self.flashcards_dir().join("decks.json")
    }

    fn reviews_path(&self) -> PathBuf {
        self.flashcards_dir().join("reviews.jsonl")
    }

    fn card_path(&self, card_id: Uuid) -> PathBuf {
        self.cards_dir().join(format!("{}.json", card_id))
    }

    /// Initialize flashcard storage directories
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.cards_dir())?;

        let decks_path = self.decks_path();
        if !decks_path.exists() {
            let empty_decks: Vec<Deck> = Vec::new();
            write_atomic(&decks_path, &serde_json::to_vec_pretty(&empty_decks)?)?;
        }

        Ok(())
    }

    fn write_decks(&self, decks: &[Deck]) -> Result<()> {
        self.init()?;
        write_atomic(&self.decks_path(), &serde_json::to_vec_pretty(decks)?)
    }

    /// Scratch area an import is written into before it replaces the live data
    fn staging(&self) -> FlashcardStorage {
        FlashcardStorage::new(self.base_path.join("import-staging"))
    }

    /// Where the live data is parked while a staged import is swapped in
    fn retired_dir(&self) -> PathBuf {
        self.base_path.join("flashcards.old")
    }

    /// Write a full collection into this (empty) store
    fn write_collection(&self, decks: &[Deck], cards: &[Flashcard], reviews: &[ReviewLog]) -> Result<()> {
        self.write_decks(decks)?;
        for card in cards {
            self.put_card(card)?;
        }

        let mut lines = Vec::new();
        for review in reviews {
            serde_json::to_writer(&mut lines, review)?;
            lines.push(b'\n');
        }
        write_atomic(&self.reviews_path(), &lines)
    }

    /// Move the staged `flashcards/` directory over the live one
    fn swap_in(&self, staging: &FlashcardStorage) -> Result<()> {
        let live = self.flashcards_dir();
        let retired = self.retired_dir();
        if retired.exists() {
            fs::remove_dir_all(&retired)?;
        }

        let had_live = live.exists();
        if had_live {
            fs::rename(&live, &retired)?;
        }
        if let Err(e) = fs::rename(staging.flashcards_dir(), &live) {
            if had_live {
                if let Err(restore_err) = fs::rename(&retired, &live) {
                    log::error!("Failed to restore flashcards after aborted import: {}", restore_err);
                }
            }
            return Err(e.into());
        }

        if had_live {
            if let Err(e) = fs::remove_dir_all(&retired) {
                log::warn!("Failed to remove {:?}: {}", retired, e);
            }
        }
        Ok(())
    }

    fn read_card_file(path: &Path) -> Result<Flashcard> {
        let content = fs::read_to_string(path)?;
        let card: Flashcard = serde_json::from_str(&content)?;
        Ok(card)
    }
}

impl FlashcardStore for FlashcardStorage {
    // ==================== Deck Operations ====================

    fn list_decks(&self) -> Result<Vec<Deck>> {
        let decks_path = self.decks_path();
        if !decks_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&decks_path)?;
        let decks: Vec<Deck> = serde_json::from_str(&content)?;
        Ok(decks)
    }

    fn get_deck(&self, deck_id: Uuid) -> Result<Option<Deck>> {
        Ok(self.list_decks()?.into_iter().find(|d| d.id == deck_id))
    }

    fn put_deck(&self, deck: &Deck) -> Result<()> {
        let mut decks = self.list_decks()?;
        match decks.iter().position(|d| d.id == deck.id) {
            Some(pos) => decks[pos] = deck.clone(),
            None => decks.push(deck.clone()),
        }
        self.write_decks(&decks)
    }

    fn delete_deck(&self, deck_id: Uuid) -> Result<()> {
        // Delete all cards in the deck
        let cards = self.cards_by_deck(deck_id)?;
        for card in &cards {
            self.delete_card(card.id)?;
        }

        let mut decks = self.list_decks()?;
        decks.retain(|d| d.id != deck_id);
        self.write_decks(&decks)?;

        log::info!("Deleted deck {} with {} cards", deck_id, cards.len());
        Ok(())
    }

    // ==================== Card Operations ====================

    fn list_cards(&self) -> Result<Vec<Flashcard>> {
        let cards_dir = self.cards_dir();
        if !cards_dir.exists() {
            return Ok(Vec::new());
        }

        let mut cards = Vec::new();
        for entry in fs::read_dir(&cards_dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                cards.push(Self::read_card_file(&path)?);
            }
        }

        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(cards)
    }

    fn get_card(&self, card_id: Uuid) -> Result<Option<Flashcard>> {
        let card_path = self.card_path(card_id);
        if !card_path.exists() {
            return Ok(None);
        }
        Self::read_card_file(&card_path).map(Some)
    }

    fn cards_by_deck(&self, deck_id: Uuid) -> Result<Vec<Flashcard>> {
        Ok(self
            .list_cards()?
            .into_iter()
            .filter(|c| c.deck_id == deck_id)
            .collect())
    }

    fn put_card(&self, card: &Flashcard) -> Result<()> {
        self.init()?;
        write_atomic(&self.card_path(card.id), &serde_json::to_vec_pretty(card)?)
    }

    fn delete_card(&self, card_id: Uuid) -> Result<()> {
        let card_path = self.card_path(card_id);
        if !card_path.exists() {
            return Err(FlashcardStorageError::CardNotFound(card_id));
        }
        fs::remove_file(&card_path)?;
        Ok(())
    }

    // ==================== Review Log ====================

    fn append_review(&self, review: &ReviewLog) -> Result<()> {
        self.init()?;
        let mut line = serde_json::to_vec(review)?;
        line.push(b'\n');

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.reviews_path())?;

        append_or_rollback(&file, |mut f| {
            f.write_all(&line)?;
            f.sync_data()
        })?;
        Ok(())
    }

    fn list_reviews(&self) -> Result<Vec<ReviewLog>> {
        let path = self.reviews_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(&path)?);
        let mut reviews = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ReviewLog>(trimmed) {
                Ok(review) => reviews.push(review),
                // A torn final line from an interrupted append is skipped
                Err(e) => log::warn!("Skipping unreadable review log line {}: {}", index + 1, e),
            }
        }

        Ok(reviews)
    }

    fn clear(&self) -> Result<()> {
        let dir = self.flashcards_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        self.init()
    }

    fn replace_all(&self, decks: &[Deck], cards: &[Flashcard], reviews: &[ReviewLog]) -> Result<()> {
        let staging = self.staging();
        if staging.base_path.is_dir() {
            fs::remove_dir_all(&staging.base_path)?;
        }

        let result = staging
            .write_collection(decks, cards, reviews)
            .and_then(|()| self.swap_in(&staging));

        if staging.base_path.is_dir() {
            if let Err(e) = fs::remove_dir_all(&staging.base_path) {
                log::warn!("Failed to remove import staging directory: {}", e);
            }
        }

        if let Err(e) = &result {
            log::error!("Import aborted, existing flashcards kept: {}", e);
        }
        result
    }
}

/// Run `write` against the end of `file`; on error, cut the file back to
/// its previous length so no partial record stays behind.
fn append_or_rollback<F>(file: &fs::File, write: F) -> io::Result<()>
where
    F: FnOnce(&fs::File) -> io::Result<()>,
{
    let prev_len = file.metadata()?.len();
    if let Err(e) = write(file) {
        if let Err(truncate_err) = file.set_len(prev_len) {
            log::error!("Failed to roll back partial review log entry: {}", truncate_err);
        }
        return Err(e);
    }
    Ok(())
}

/// Write to a sibling temp file, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
