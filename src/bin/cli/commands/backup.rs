use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;

use flashdeck_lib::flashcards::backup::{export_to_file, import_from_file};

use crate::app::App;
use crate::OutputFormat;

pub fn run_export(app: &App, path: &Path, format: &OutputFormat) -> Result<()> {
    let snapshot = export_to_file(&app.storage, path, Utc::now())
        .with_context(|| format!("Failed to export to {}", path.display()))?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": path.to_string_lossy(),
                "decks": snapshot.decks.len(),
                "cards": snapshot.cards.len(),
                "reviews": snapshot.reviews.len(),
                "exportedAt": snapshot.exported_at.timestamp_millis(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!(
                "Exported {} decks, {} cards, {} reviews to {}",
                snapshot.decks.len(),
                snapshot.cards.len(),
                snapshot.reviews.len(),
                path.display()
            );
        }
    }

    Ok(())
}

pub fn run_import(app: &App, path: &Path, yes: bool, format: &OutputFormat) -> Result<()> {
    if !yes {
        bail!(
            "Importing replaces all decks, cards and reviews in {}. Re-run with --yes to continue.",
            app.storage.base_path().display()
        );
    }

    let summary = import_from_file(&app.storage, path)
        .with_context(|| format!("Failed to import {}", path.display()))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Plain => {
            println!(
                "Imported {} decks, {} cards, {} reviews",
                summary.deck_count, summary.card_count, summary.review_count
            );
        }
    }

    Ok(())
}
