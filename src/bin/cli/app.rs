use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;

use flashdeck_lib::flashcards::{
    AppConfig, Deck, DeckSummary, Flashcard, FlashcardStorage, FlashcardStore, Scheduler,
};

/// Shared application state for CLI commands
pub struct App {
    pub storage: FlashcardStorage,
    pub config: AppConfig,
    pub scheduler: Scheduler,
}

impl App {
    /// Initialize from the given or default data directory
    pub fn new(data_dir: Option<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => FlashcardStorage::default_data_dir()
                .context("Failed to get data directory")?,
        };

        let config = AppConfig::load(config_path, &data_dir)
            .context("Failed to load configuration")?;
        let scheduler = Scheduler::new(config.scheduler.clone())
            .context("Invalid scheduler configuration")?;

        let storage = FlashcardStorage::new(data_dir);
        storage.init().context("Failed to initialize flashcard storage")?;

        Ok(Self {
            storage,
            config,
            scheduler,
        })
    }

    /// Find a deck by name (case-insensitive prefix match)
    pub fn find_deck(&self, name: &str) -> Result<Deck> {
        let decks = self.list_decks()?;
        let name_lower = name.to_lowercase();

        // Exact match first
        if let Some(deck) = decks.iter().find(|d| d.name.to_lowercase() == name_lower) {
            return Ok(deck.clone());
        }

        // Prefix match
        let matches: Vec<&Deck> = decks.iter()
            .filter(|d| d.name.to_lowercase().starts_with(&name_lower))
            .collect();

        match matches.len() {
            0 => bail!("No deck matching '{}'. Available decks:\n{}", name,
                decks.iter().map(|d| format!("  - {}", d.name)).collect::<Vec<_>>().join("\n")),
            1 => Ok(matches[0].clone()),
            _ => bail!("Ambiguous deck name '{}'. Matches:\n{}", name,
                matches.iter().map(|d| format!("  - {}", d.name)).collect::<Vec<_>>().join("\n")),
        }
    }

    /// Find a card by full ID or unique ID prefix
    pub fn find_card(&self, id: &str) -> Result<Flashcard> {
        let id_lower = id.trim().to_lowercase();
        if id_lower.is_empty() {
            bail!("Card ID must not be empty");
        }

        let cards = self.storage.list_cards().context("Failed to list cards")?;
        let matches: Vec<&Flashcard> = cards.iter()
            .filter(|c| c.id.to_string().starts_with(&id_lower))
            .collect();

        match matches.len() {
            0 => bail!("No card with ID '{}'", id),
            1 => Ok(matches[0].clone()),
            n => bail!("Ambiguous card ID '{}' ({} matches)", id, n),
        }
    }

    /// List all decks
    pub fn list_decks(&self) -> Result<Vec<Deck>> {
        self.storage.list_decks().context("Failed to list decks")
    }

    /// All decks with their card counts as of now
    pub fn deck_summaries(&self) -> Result<Vec<DeckSummary>> {
        let now = Utc::now();
        let mut summaries = Vec::new();
        for deck in self.list_decks()? {
            let cards = self.list_cards(&deck)?;
            summaries.push(DeckSummary::from_cards(deck, &cards, now));
        }
        Ok(summaries)
    }

    /// List cards in a deck
    pub fn list_cards(&self, deck: &Deck) -> Result<Vec<Flashcard>> {
        self.storage.cards_by_deck(deck.id).context("Failed to list cards")
    }

    /// Save a card
    pub fn save_card(&self, card: &Flashcard) -> Result<()> {
        self.storage.put_card(card).context("Failed to save card")
    }
}
