//! Review sessions: due-card selection and the in-session queue
//!
//! A session is built once from the cards that are due, then driven one
//! rating at a time. Each rating is persisted before the in-memory queue
//! moves, so a failed write leaves the session exactly where it was and the
//! same rating can be retried.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::algorithm::Scheduler;
use super::models::{CardStatus, Flashcard, Rating, ReviewLog};
use super::storage::{FlashcardStorageError, FlashcardStore};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No card left to review in this session")]
    EmptyQueue,

    #[error("Storage error: {0}")]
    Storage(#[from] FlashcardStorageError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Whether a card belongs in a review session started at `now`
pub fn is_due(card: &Flashcard, now: DateTime<Utc>) -> bool {
    card.state.due_date <= now
        || matches!(card.state.status, CardStatus::New | CardStatus::Learning)
}

/// Due cards, earliest due first. Ties keep their input order.
pub fn select_due(cards: Vec<Flashcard>, now: DateTime<Utc>) -> Vec<Flashcard> {
    let mut due: Vec<Flashcard> = cards.into_iter().filter(|c| is_due(c, now)).collect();
    due.sort_by(|a, b| a.state.due_date.cmp(&b.state.due_date));
    due
}

/// Ratings that count toward session accuracy
pub fn is_correct(rating: Rating) -> bool {
    rating != Rating::Again
}

/// Running counters for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Cards that left the queue
    pub reviewed: usize,
    /// Cards rated anything but Again
    pub correct: usize,
}

/// Result of applying one rating
#[derive(Debug, Clone)]
pub struct Advance {
    /// The card as persisted
    pub card: Flashcard,
    /// The card went back to the tail of the queue
    pub requeued: bool,
    /// This rating emptied the queue
    pub completed: bool,
}

/// Ordered working set of cards for one review session
pub struct ReviewSession<'a, S: FlashcardStore + ?Sized> {
    store: &'a S,
    scheduler: &'a Scheduler,
    queue: VecDeque<Flashcard>,
    stats: SessionStats,
    completion_signaled: bool,
}

impl<'a, S: FlashcardStore + ?Sized> ReviewSession<'a, S> {
    /// Start a session over an already-selected queue
    pub fn new(store: &'a S, scheduler: &'a Scheduler, cards: Vec<Flashcard>) -> Self {
        log::debug!("Starting review session with {} cards", cards.len());
        Self {
            store,
            scheduler,
            queue: cards.into(),
            stats: SessionStats::default(),
            completion_signaled: false,
        }
    }

    /// Select the due cards from `cards` and start a session over them
    pub fn from_due(
        store: &'a S,
        scheduler: &'a Scheduler,
        cards: Vec<Flashcard>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(store, scheduler, select_due(cards, now))
    }

    /// The card awaiting a rating
    pub fn current(&self) -> Option<&Flashcard> {
        self.queue.front()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Fraction of the session done, from 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        let total = self.stats.reviewed + self.queue.len();
        if total == 0 {
            1.0
        } else {
            self.stats.reviewed as f64 / total as f64
        }
    }

    /// Returns `true` exactly once, the first time it is called with an
    /// empty queue.
    pub fn poll_complete(&mut self) -> bool {
        if self.queue.is_empty() && !self.completion_signaled {
            self.completion_signaled = true;
            true
        } else {
            false
        }
    }

    /// Apply `rating` to the head card.
    ///
    /// The new state and a review log entry are written before the queue
    /// changes. On any storage error the queue and counters are untouched.
    pub fn advance(&mut self, rating: Rating, now: DateTime<Utc>) -> Result<Advance> {
        let head = self.queue.front().ok_or(SessionError::EmptyQueue)?;

        let next_state = self.scheduler.next_state(&head.state, rating, now);
        let updated = head.with_state(next_state);

        self.store.put_card(&updated)?;
        if let Err(e) = self.store.append_review(&ReviewLog::new(updated.id, rating, now)) {
            if let Err(restore_err) = self.store.put_card(head) {
                log::warn!(
                    "Failed to restore card {} after review log error: {}",
                    head.id,
                    restore_err
                );
            }
            return Err(e.into());
        }

        log::debug!(
            "Card {} rated {}: {} -> {}, due {}",
            updated.id,
            rating,
            head.state.status,
            updated.state.status,
            updated.state.due_date
        );

        self.queue.pop_front();
        let requeued = !is_correct(rating);
        if requeued {
            self.queue.push_back(updated.clone());
        } else {
            self.stats.reviewed += 1;
            self.stats.correct += 1;
        }

        let completed = self.poll_complete();
        if completed {
            log::info!(
                "Review session complete: {} reviewed, {} correct",
                self.stats.reviewed,
                self.stats.correct
            );
        }

        Ok(Advance {
            card: updated,
            requeued,
            completed,
        })
    }
}
