//! Flashcard and spaced repetition system
//!
//! This module provides:
//! - Deck and card models with inline scheduling state
//! - Two-phase (learning steps, then growing intervals) scheduler
//! - Review sessions over the due queue
//! - File-backed storage, backup snapshots and AI card generation

pub mod algorithm;
pub mod backup;
pub mod config;
pub mod generator;
pub mod models;
pub mod session;
pub mod storage;

pub use algorithm::Scheduler;
pub use config::{AppConfig, ConfigError, GeneratorConfig, SchedulerConfig};
pub use models::*;
pub use session::{Advance, ReviewSession, SessionError, SessionStats};
pub use storage::{FlashcardStorage, FlashcardStorageError, FlashcardStore};
