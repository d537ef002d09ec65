use std::io::{self, BufRead, Write};

use anyhow::Result;
use chrono::Utc;

use flashdeck_lib::flashcards::algorithm::format_due_in;
use flashdeck_lib::flashcards::{InvalidRating, Rating, ReviewSession};

use crate::app::App;
use crate::render::terminal::{paint, rating_color, status_color, wrap_lines, Color};
use crate::OutputFormat;

/// Interactive review of a deck's due cards on stdin/stdout
pub fn run(app: &App, deck_name: &str, use_color: bool) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let cards = app.list_cards(&deck)?;
    let mut session = ReviewSession::from_due(&app.storage, &app.scheduler, cards, Utc::now());

    if session.poll_complete() {
        println!("Nothing due in \"{}\". All caught up.", deck.name);
        return Ok(());
    }

    println!(
        "Reviewing \"{}\": {} cards due. Enter reveals the answer, q quits.",
        deck.name,
        session.remaining()
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    'session: while let Some(card) = session.current().cloned() {
        println!();
        println!(
            "{}",
            paint(
                &format!(
                    "[{:>3.0}%] {} left  {}",
                    session.progress() * 100.0,
                    session.remaining(),
                    card.state.status
                ),
                status_color(card.state.status),
                use_color
            )
        );
        for line in wrap_lines(&card.front, "  ", 80) {
            println!("{}", paint(&line, Color::BOLD, use_color));
        }

        match read_line(&mut lines, "")? {
            Some(input) if is_quit(&input) => break 'session,
            Some(_) => {}
            None => break 'session,
        }

        println!("{}", paint("  ---", Color::DIM, use_color));
        for line in wrap_lines(&card.back, "  ", 80) {
            println!("{}", line);
        }

        let now = Utc::now();
        let options: Vec<String> = app
            .scheduler
            .preview(&card.state, now)
            .iter()
            .map(|(rating, next)| {
                let label = format!(
                    "{} {} ({})",
                    *rating as u8 + 1,
                    rating,
                    format_due_in(now, next.due_date)
                );
                paint(&label, rating_color(*rating), use_color)
            })
            .collect();
        println!("  {}", options.join("   "));

        loop {
            let input = match read_line(&mut lines, "> ")? {
                Some(input) => input,
                None => break 'session,
            };
            if is_quit(&input) {
                break 'session;
            }

            let rating = match parse_rating_key(&input) {
                Ok(rating) => rating,
                Err(e) => {
                    println!("{}", paint(&format!("{}. Use 1-4 or again/hard/good/easy.", e), Color::YELLOW, use_color));
                    continue;
                }
            };

            match session.advance(rating, Utc::now()) {
                Ok(advance) => {
                    if advance.requeued {
                        println!("{}", paint("  Card will come back later in this session", Color::GRAY, use_color));
                    }
                    break;
                }
                Err(e) => {
                    log::error!("Failed to record review for card {}: {}", card.id, e);
                    println!("{}", paint(&format!("Could not save review: {}. Try again.", e), Color::RED, use_color));
                }
            }
        }
    }

    let stats = session.stats();
    println!();
    if session.is_empty() {
        println!(
            "{}",
            paint(
                &format!("Session complete: {} cards reviewed.", stats.reviewed),
                Color::GREEN,
                use_color
            )
        );
    } else {
        println!(
            "Stopped with {} cards left ({} reviewed).",
            session.remaining(),
            stats.reviewed
        );
    }

    Ok(())
}

/// Show the state each rating would produce for a card
pub fn run_preview(app: &App, card_id: &str, format: &OutputFormat) -> Result<()> {
    let card = app.find_card(card_id)?;
    let now = Utc::now();
    let outcomes = app.scheduler.preview(&card.state, now);

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = outcomes
                .iter()
                .map(|(rating, next)| {
                    serde_json::json!({
                        "rating": rating,
                        "status": next.status,
                        "step": next.step,
                        "interval": next.interval,
                        "ease": next.ease,
                        "dueDate": next.due_date.timestamp_millis(),
                        "dueIn": format_due_in(now, next.due_date),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("{}", card.front);
            println!(
                "  Now: {} (step {}, interval {}d, ease {:.2})",
                card.state.status, card.state.step, card.state.interval, card.state.ease
            );
            println!();
            for (rating, next) in &outcomes {
                println!(
                    "  {:<6} -> {:<10} due in {:<5} interval {}d, ease {:.2}",
                    rating.as_str(),
                    next.status.as_str(),
                    format_due_in(now, next.due_date),
                    next.interval,
                    next.ease
                );
            }
        }
    }

    Ok(())
}

/// Rating typed at the prompt. Keys `1`-`4` follow the on-screen labels;
/// anything else goes through `Rating::from_str`.
fn parse_rating_key(input: &str) -> std::result::Result<Rating, InvalidRating> {
    match input.trim() {
        key @ ("1" | "2" | "3" | "4") => {
            let code = key.as_bytes()[0] - b'1';
            Rating::try_from(code)
        }
        digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            Err(InvalidRating(digits.to_string()))
        }
        other => other.parse(),
    }
}

fn is_quit(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "q" | "quit")
}

/// Print `prompt` and read one line; `None` at end of input
fn read_line<I>(lines: &mut I, prompt: &str) -> Result<Option<String>>
where
    I: Iterator<Item = io::Result<String>>,
{
    print!("{}", prompt);
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?)),
        None => Ok(None),
    }
}
