use anyhow::{bail, Context, Result};
use chrono::Utc;

use flashdeck_lib::flashcards::{Deck, FlashcardStore};

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run_list(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let summaries = app.deck_summaries()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Plain => {
            if summaries.is_empty() {
                println!("No decks. Create one with `flashdeck-cli deck new <name>`.");
                return Ok(());
            }

            let name_width = summaries.iter().map(|s| s.deck.name.chars().count()).max().unwrap_or(4).max(4);
            println!(
                "{}",
                paint(
                    &format!("{:<width$}  {:>5}  {:>5}  {:>5}", "DECK", "CARDS", "DUE", "NEW", width = name_width),
                    Color::BOLD,
                    use_color
                )
            );
            for summary in &summaries {
                let due = format!("{:>5}", summary.due_count);
                let due = if summary.due_count > 0 { paint(&due, Color::GREEN, use_color) } else { due };
                println!(
                    "{:<width$}  {:>5}  {}  {:>5}",
                    summary.deck.name,
                    summary.card_count,
                    due,
                    summary.new_count,
                    width = name_width
                );
            }
        }
    }

    Ok(())
}

pub fn run_new(
    app: &App,
    name: String,
    description: Option<String>,
    color: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("Deck name must not be empty");
    }
    if app.list_decks()?.iter().any(|d| d.name.eq_ignore_ascii_case(&name)) {
        bail!("A deck named '{}' already exists", name);
    }

    let mut deck = Deck::new(name, Utc::now());
    deck.description = description.filter(|d| !d.trim().is_empty());
    deck.color = color;
    app.storage.put_deck(&deck).context("Failed to save deck")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&deck)?);
        }
        OutputFormat::Plain => {
            println!("Created deck \"{}\"", deck.name);
            println!("  ID: {}", deck.id);
        }
    }

    Ok(())
}

pub fn run_rm(app: &App, deck_name: &str, format: &OutputFormat) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let card_count = app.list_cards(&deck)?.len();
    app.storage.delete_deck(deck.id).context("Failed to delete deck")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": deck.id.to_string(),
                "name": deck.name,
                "deletedCards": card_count,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Deleted deck \"{}\" and {} cards", deck.name, card_count);
        }
    }

    Ok(())
}
