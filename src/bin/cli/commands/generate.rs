use anyhow::{bail, Context, Result};
use chrono::Utc;

use flashdeck_lib::flashcards::generator::{cards_from_generated, CardGenerator, GeminiGenerator};

use crate::app::App;
use crate::render::terminal::truncate_line;
use crate::OutputFormat;

pub fn run(
    app: &App,
    deck_name: &str,
    content: Option<String>,
    count: Option<usize>,
    format: &OutputFormat,
) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let text = content
        .filter(|c| !c.trim().is_empty())
        .context("No source text. Pass --content or pipe text on stdin.")?;

    let count = count.unwrap_or(app.config.generator.default_count);
    if count == 0 {
        bail!("--count must be at least 1");
    }

    let generator = GeminiGenerator::new(app.config.generator.clone())?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let generated = runtime
        .block_on(generator.generate(&text, count))
        .context("Card generation failed")?;

    let cards = cards_from_generated(deck.id, generated, app.scheduler.config(), Utc::now());
    for card in &cards {
        app.save_card(card)?;
    }
    log::info!("Saved {} generated cards to deck {}", cards.len(), deck.id);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        OutputFormat::Plain => {
            if cards.is_empty() {
                println!("The model returned no usable cards.");
                return Ok(());
            }
            println!("Added {} cards to \"{}\":", cards.len(), deck.name);
            for card in &cards {
                println!("  Q: {}", truncate_line(&card.front, 70));
                println!("  A: {}", truncate_line(&card.back, 70));
            }
        }
    }

    Ok(())
}
