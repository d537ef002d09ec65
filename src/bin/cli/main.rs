mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "flashdeck-cli", about = "Spaced-repetition flashcards in the terminal", version)]
struct Cli {
    /// Data directory (default: platform local data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List decks with card, due and new counts
    Decks,

    /// Create or delete decks
    #[command(subcommand)]
    Deck(DeckCommand),

    /// List cards in a deck
    Cards {
        /// Deck name (case-insensitive prefix match)
        deck: String,
    },

    /// Add, edit or delete a card
    #[command(subcommand)]
    Card(CardCommand),

    /// Review the due cards of a deck
    Review {
        /// Deck name (case-insensitive prefix match)
        deck: String,
    },

    /// Show what each rating would do to a card
    Preview {
        /// Card ID (or unique prefix)
        card: String,
    },

    /// Generate cards from text with the configured model
    Generate {
        /// Deck name (case-insensitive prefix match)
        deck: String,
        /// Source text (use "-" to read from stdin)
        #[arg(long)]
        content: Option<String>,
        /// Number of cards to request
        #[arg(long)]
        count: Option<usize>,
    },

    /// Write every deck, card and review to a JSON file
    Export {
        /// Output file
        path: PathBuf,
    },

    /// Replace all data with the contents of a JSON backup
    Import {
        /// Backup file
        path: PathBuf,
        /// Confirm that existing data will be replaced
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum DeckCommand {
    /// Create a new deck
    New {
        /// Deck name
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Theme color (hex code)
        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a deck and all its cards
    Rm {
        /// Deck name (case-insensitive prefix match)
        deck: String,
    },
}

#[derive(Subcommand)]
enum CardCommand {
    /// Add a card to a deck
    Add {
        /// Deck name (case-insensitive prefix match)
        deck: String,
        /// Question side
        front: String,
        /// Answer side
        back: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Edit a card's content (scheduling is kept)
    Edit {
        /// Card ID (or unique prefix)
        card: String,
        #[arg(long)]
        front: Option<String>,
        #[arg(long)]
        back: Option<String>,
        /// Comma-separated tags (replaces existing tags)
        #[arg(long)]
        tags: Option<String>,
    },

    /// Delete a card
    Rm {
        /// Card ID (or unique prefix)
        card: String,
    },
}

/// Read content from stdin if piped, or resolve "-" as stdin
fn resolve_content(content: Option<String>) -> Option<String> {
    match content.as_deref() {
        Some("-") => {
            // Explicit stdin read
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).ok();
            Some(buf)
        }
        Some(_) => content,
        None => {
            // Auto-detect piped stdin
            if !stdin_is_tty() {
                let mut buf = String::new();
                std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).ok();
                if buf.is_empty() { None } else { Some(buf) }
            } else {
                None
            }
        }
    }
}

/// Check if stdin is a terminal (not piped)
fn stdin_is_tty() -> bool {
    unsafe { libc_isatty(0) != 0 }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let app = app::App::new(cli.data_dir, cli.config.as_deref())?;

    match cli.command {
        Command::Decks => {
            commands::decks::run_list(&app, &cli.format, use_color)?;
        }
        Command::Deck(DeckCommand::New { name, description, color }) => {
            commands::decks::run_new(&app, name, description, color, &cli.format)?;
        }
        Command::Deck(DeckCommand::Rm { deck }) => {
            commands::decks::run_rm(&app, &deck, &cli.format)?;
        }
        Command::Cards { deck } => {
            commands::cards::run_list(&app, &deck, &cli.format, use_color)?;
        }
        Command::Card(CardCommand::Add { deck, front, back, tags }) => {
            commands::cards::run_add(&app, &deck, front, back, tags.as_deref(), &cli.format)?;
        }
        Command::Card(CardCommand::Edit { card, front, back, tags }) => {
            commands::cards::run_edit(&app, &card, front, back, tags.as_deref(), &cli.format)?;
        }
        Command::Card(CardCommand::Rm { card }) => {
            commands::cards::run_rm(&app, &card, &cli.format)?;
        }
        Command::Review { deck } => {
            commands::review::run(&app, &deck, use_color)?;
        }
        Command::Preview { card } => {
            commands::review::run_preview(&app, &card, &cli.format)?;
        }
        Command::Generate { deck, content, count } => {
            let content = resolve_content(content);
            commands::generate::run(&app, &deck, content, count, &cli.format)?;
        }
        Command::Export { path } => {
            commands::backup::run_export(&app, &path, &cli.format)?;
        }
        Command::Import { path, yes } => {
            commands::backup::run_import(&app, &path, yes, &cli.format)?;
        }
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
