use anyhow::{bail, Context, Result};
use chrono::Utc;

use flashdeck_lib::flashcards::algorithm::format_due_in;
use flashdeck_lib::flashcards::{parse_tags, Flashcard, FlashcardStore};

use crate::app::App;
use crate::render::terminal::{paint, status_color, truncate_line, Color};
use crate::OutputFormat;

pub fn run_list(app: &App, deck_name: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let mut cards = app.list_cards(&deck)?;
    cards.sort_by_key(|c| c.state.due_date);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        OutputFormat::Plain => {
            if cards.is_empty() {
                println!("No cards in \"{}\"", deck.name);
                return Ok(());
            }

            let now = Utc::now();
            for card in &cards {
                let id = card.id.to_string();
                let status = format!("{:<10}", card.state.status.as_str());
                println!(
                    "{}  {}  {:>5}  {}",
                    paint(&id[..8], Color::GRAY, use_color),
                    paint(&status, status_color(card.state.status), use_color),
                    format_due_in(now, card.state.due_date),
                    truncate_line(&card.front, 60)
                );
            }
            println!();
            println!("{} cards", cards.len());
        }
    }

    Ok(())
}

pub fn run_add(
    app: &App,
    deck_name: &str,
    front: String,
    back: String,
    tags: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    if front.trim().is_empty() || back.trim().is_empty() {
        bail!("Both sides of a card need text");
    }

    let mut card = Flashcard::new(deck.id, front, back, app.scheduler.config(), Utc::now());
    if let Some(tag_str) = tags {
        card.tags = parse_tags(tag_str);
    }
    app.save_card(&card)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        OutputFormat::Plain => {
            println!("Added card to \"{}\"", deck.name);
            if !card.tags.is_empty() {
                println!("  Tags: {}", card.tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" "));
            }
            println!("  ID: {}", card.id);
        }
    }

    Ok(())
}

pub fn run_edit(
    app: &App,
    card_id: &str,
    front: Option<String>,
    back: Option<String>,
    tags: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    if front.is_none() && back.is_none() && tags.is_none() {
        bail!("Nothing to change. Pass --front, --back or --tags.");
    }

    let mut card = app.find_card(card_id)?;
    if let Some(front) = front {
        if front.trim().is_empty() {
            bail!("Front must not be empty");
        }
        card.front = front;
    }
    if let Some(back) = back {
        if back.trim().is_empty() {
            bail!("Back must not be empty");
        }
        card.back = back;
    }
    if let Some(tag_str) = tags {
        card.tags = parse_tags(tag_str);
    }
    app.save_card(&card)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        OutputFormat::Plain => {
            println!("Updated card {}", card.id);
        }
    }

    Ok(())
}

pub fn run_rm(app: &App, card_id: &str, format: &OutputFormat) -> Result<()> {
    let card = app.find_card(card_id)?;
    app.storage.delete_card(card.id).context("Failed to delete card")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": card.id.to_string(),
                "deleted": true,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Deleted card \"{}\"", truncate_line(&card.front, 60));
        }
    }

    Ok(())
}
