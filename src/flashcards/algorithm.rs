//! Two-phase spaced repetition scheduler
//!
//! New and failed cards climb a ladder of minute-long learning steps. Once the
//! last step is passed the card graduates and its interval grows in days,
//! multiplied by a per-card ease factor on every successful review.
//!
//! Transitions, keyed by `(status, rating)`:
//! - `Again` from any status: back to step 0 of the ladder, ease -0.2
//! - learning phase, `Hard`: repeat the current step
//! - learning phase, `Good`/`Easy`: next step, or graduate from the last one
//! - review, `Hard`/`Good`/`Easy`: interval x1.2 / x ease / x ease x1.3

use chrono::{DateTime, Duration, Utc};

use super::config::{ConfigError, SchedulerConfig};
use super::models::{to_millis, CardState, CardStatus, Rating};

/// Minimum ease factor allowed
pub const MIN_EASE: f64 = 1.3;

const AGAIN_EASE_PENALTY: f64 = 0.2;
const HARD_EASE_PENALTY: f64 = 0.15;
const EASY_EASE_BONUS: f64 = 0.15;
const HARD_INTERVAL_FACTOR: f64 = 1.2;
const EASY_INTERVAL_FACTOR: f64 = 1.3;

/// Upper bound on a review interval (100 years)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// A passing rating. `Again` never reaches the phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recall {
    Hard,
    Good,
    Easy,
}

impl Recall {
    fn from_rating(rating: Rating) -> Option<Self> {
        match rating {
            Rating::Again => None,
            Rating::Hard => Some(Self::Hard),
            Rating::Good => Some(Self::Good),
            Rating::Easy => Some(Self::Easy),
        }
    }
}

/// Pure scheduling function bound to a validated configuration
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// State of a card that has never been reviewed
    pub fn initial_state(&self, now: DateTime<Utc>) -> CardState {
        CardState::new(&self.config, now)
    }

    /// Compute the state that follows `state` after `rating` at `now`
    pub fn next_state(&self, state: &CardState, rating: Rating, now: DateTime<Utc>) -> CardState {
        let now = to_millis(now);
        let Some(recall) = Recall::from_rating(rating) else {
            return self.lapse(state, now);
        };

        match (state.status, recall) {
            (CardStatus::New | CardStatus::Learning | CardStatus::Relearning, Recall::Hard) => {
                self.repeat_step(state, now)
            }
            (
                CardStatus::New | CardStatus::Learning | CardStatus::Relearning,
                Recall::Good | Recall::Easy,
            ) => self.climb(state, recall, now),
            (CardStatus::Review, recall) => self.review(state, recall, now),
        }
    }

    /// Next state for every rating, in `Rating::ALL` order
    pub fn preview(&self, state: &CardState, now: DateTime<Utc>) -> [(Rating, CardState); 4] {
        Rating::ALL.map(|rating| (rating, self.next_state(state, rating, now)))
    }

    fn lapse(&self, state: &CardState, now: DateTime<Utc>) -> CardState {
        CardState {
            ease: (state.ease - AGAIN_EASE_PENALTY).max(MIN_EASE),
            interval: 0,
            due_date: now + self.step_duration(0),
            status: CardStatus::Learning,
            step: 0,
        }
    }

    fn repeat_step(&self, state: &CardState, now: DateTime<Utc>) -> CardState {
        let step = self.clamp_step(state.step);
        CardState {
            due_date: now + self.step_duration(step),
            step,
            ..state.clone()
        }
    }

    fn climb(&self, state: &CardState, recall: Recall, now: DateTime<Utc>) -> CardState {
        let step = self.clamp_step(state.step);
        if step < self.last_step() {
            let step = step + 1;
            return CardState {
                due_date: now + self.step_duration(step),
                status: CardStatus::Learning,
                step,
                ..state.clone()
            };
        }

        // Graduate
        let interval = match recall {
            Recall::Easy => self.config.easy_interval,
            Recall::Hard | Recall::Good => self.config.graduating_interval,
        }
        .min(MAX_INTERVAL_DAYS);

        CardState {
            interval,
            due_date: now + Duration::days(i64::from(interval)),
            status: CardStatus::Review,
            step: 0,
            ..state.clone()
        }
    }

    fn review(&self, state: &CardState, recall: Recall, now: DateTime<Utc>) -> CardState {
        let current = f64::from(state.interval);
        let (interval, ease) = match recall {
            Recall::Hard => (
                current * HARD_INTERVAL_FACTOR,
                (state.ease - HARD_EASE_PENALTY).max(MIN_EASE),
            ),
            Recall::Good => (current * state.ease, state.ease),
            Recall::Easy => (
                current * state.ease * EASY_INTERVAL_FACTOR,
                state.ease + EASY_EASE_BONUS,
            ),
        };
        let interval = (interval.floor() as u32).min(MAX_INTERVAL_DAYS);

        CardState {
            ease,
            interval,
            due_date: now + Duration::days(i64::from(interval)),
            ..state.clone()
        }
    }

    fn last_step(&self) -> u32 {
        // validate() guarantees at least one step
        self.config.learning_steps.len().saturating_sub(1) as u32
    }

    /// Steps stored under a longer ladder fall back to the last rung
    fn clamp_step(&self, step: u32) -> u32 {
        step.min(self.last_step())
    }

    fn step_duration(&self, step: u32) -> Duration {
        let minutes = self
            .config
            .learning_steps
            .get(step as usize)
            .copied()
            .unwrap_or(0);
        Duration::minutes(i64::from(minutes))
    }
}

/// Format the time until `due` compactly for rating labels
pub fn format_due_in(now: DateTime<Utc>, due: DateTime<Utc>) -> String {
    let minutes = (due - now).num_minutes();
    if minutes < 1 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 60 * 24 {
        format!("{}h", minutes / 60)
    } else {
        format_interval(minutes / (60 * 24))
    }
}

/// Format an interval in days to a human-readable string
pub fn format_interval(days: i64) -> String {
    if days <= 0 {
        "now".to_string()
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig::default()).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn review_state(interval: u32, ease: f64) -> CardState {
        CardState {
            ease,
            interval,
            due_date: now(),
            status: CardStatus::Review,
            step: 0,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {} but got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_rejects_empty_ladder() {
        let config = SchedulerConfig {
            learning_steps: vec![],
            ..Default::default()
        };
        assert!(Scheduler::new(config).is_err());
    }

    #[test]
    fn test_new_card_climbs_then_graduates() {
        let s = scheduler();
        let start = s.initial_state(now());

        let first = s.next_state(&start, Rating::Good, now());
        assert_eq!(first.status, CardStatus::Learning);
        assert_eq!(first.step, 1);
        assert_eq!(first.due_date, now() + Duration::minutes(10));

        let second = s.next_state(&first, Rating::Good, now());
        assert_eq!(second.status, CardStatus::Review);
        assert_eq!(second.step, 0);
        assert_eq!(second.interval, 1);
        assert_eq!(second.due_date, now() + Duration::days(1));
    }

    #[test]
    fn test_easy_on_last_step_uses_easy_interval() {
        let s = scheduler();
        let mut state = s.initial_state(now());
        state.status = CardStatus::Learning;
        state.step = 1;

        let next = s.next_state(&state, Rating::Easy, now());
        assert_eq!(next.status, CardStatus::Review);
        assert_eq!(next.interval, 4);
        assert_eq!(next.due_date, now() + Duration::days(4));
    }

    #[test]
    fn test_easy_on_early_step_only_advances() {
        let s = scheduler();
        let next = s.next_state(&s.initial_state(now()), Rating::Easy, now());
        assert_eq!(next.status, CardStatus::Learning);
        assert_eq!(next.step, 1);
        assert_eq!(next.interval, 0);
    }

    #[test]
    fn test_hard_in_learning_repeats_step() {
        let s = scheduler();
        let start = s.initial_state(now());
        let next = s.next_state(&start, Rating::Hard, now());

        assert_eq!(next.status, CardStatus::New);
        assert_eq!(next.step, 0);
        assert_eq!(next.ease, start.ease);
        assert_eq!(next.due_date, now() + Duration::minutes(1));
    }

    #[test]
    fn test_relearning_good_returns_to_learning() {
        let s = scheduler();
        let mut state = s.initial_state(now());
        state.status = CardStatus::Relearning;

        let next = s.next_state(&state, Rating::Good, now());
        assert_eq!(next.status, CardStatus::Learning);
        assert_eq!(next.step, 1);
    }

    #[test]
    fn test_review_good() {
        let next = scheduler().next_state(&review_state(10, 2.5), Rating::Good, now());
        assert_eq!(next.interval, 25);
        assert_close(next.ease, 2.5);
        assert_eq!(next.status, CardStatus::Review);
        assert_eq!(next.due_date, now() + Duration::days(25));
    }

    #[test]
    fn test_review_hard() {
        let next = scheduler().next_state(&review_state(10, 2.5), Rating::Hard, now());
        assert_eq!(next.interval, 12);
        assert_close(next.ease, 2.35);
    }

    #[test]
    fn test_review_easy() {
        let next = scheduler().next_state(&review_state(10, 2.5), Rating::Easy, now());
        assert_eq!(next.interval, 32);
        assert_close(next.ease, 2.65);
    }

    #[test]
    fn test_again_resets_any_status() {
        let s = scheduler();
        for status in [
            CardStatus::New,
            CardStatus::Learning,
            CardStatus::Review,
            CardStatus::Relearning,
        ] {
            let mut state = review_state(30, 2.5);
            state.status = status;
            state.step = 1;

            let next = s.next_state(&state, Rating::Again, now());
            assert_eq!(next.status, CardStatus::Learning);
            assert_eq!(next.step, 0);
            assert_eq!(next.interval, 0);
            assert_close(next.ease, 2.3);
            assert_eq!(next.due_date, now() + Duration::minutes(1));
        }
    }

    #[test]
    fn test_ease_never_below_minimum() {
        let s = scheduler();
        let mut state = review_state(10, 1.35);
        for rating in [Rating::Again, Rating::Again, Rating::Hard, Rating::Again] {
            state = s.next_state(&state, rating, now());
            assert!(state.ease >= MIN_EASE);
        }
        assert_close(state.ease, MIN_EASE);

        let hard = s.next_state(&review_state(10, 1.4), Rating::Hard, now());
        assert_close(hard.ease, MIN_EASE);
    }

    #[test]
    fn test_due_date_never_before_now() {
        let s = scheduler();
        let mut state = s.initial_state(now());
        let sequence = [
            Rating::Good,
            Rating::Hard,
            Rating::Good,
            Rating::Easy,
            Rating::Again,
            Rating::Good,
            Rating::Good,
            Rating::Hard,
        ];
        for rating in sequence {
            state = s.next_state(&state, rating, now());
            assert!(state.due_date >= now());
        }
    }

    #[test]
    fn test_out_of_range_step_is_clamped() {
        let s = scheduler();
        let mut state = s.initial_state(now());
        state.status = CardStatus::Learning;
        state.step = 7;

        let hard = s.next_state(&state, Rating::Hard, now());
        assert_eq!(hard.step, 1);
        assert_eq!(hard.due_date, now() + Duration::minutes(10));

        let good = s.next_state(&state, Rating::Good, now());
        assert_eq!(good.status, CardStatus::Review);
    }

    #[test]
    fn test_single_step_ladder_graduates_immediately() {
        let s = Scheduler::new(SchedulerConfig {
            learning_steps: vec![5],
            ..Default::default()
        })
        .unwrap();
        let next = s.next_state(&s.initial_state(now()), Rating::Good, now());
        assert_eq!(next.status, CardStatus::Review);
        assert_eq!(next.interval, 1);
    }

    #[test]
    fn test_interval_is_capped() {
        let next = scheduler().next_state(&review_state(30_000, 3.0), Rating::Easy, now());
        assert_eq!(next.interval, MAX_INTERVAL_DAYS);
    }

    #[test]
    fn test_same_inputs_same_output() {
        let s = scheduler();
        let state = review_state(10, 2.5);
        for rating in Rating::ALL {
            assert_eq!(
                s.next_state(&state, rating, now()),
                s.next_state(&state, rating, now())
            );
        }
    }

    #[test]
    fn test_due_date_has_whole_milliseconds() {
        let s = scheduler();
        let now = now() + Duration::nanoseconds(564_332_106);
        for rating in Rating::ALL {
            let next = s.next_state(&s.initial_state(now), rating, now);
            assert_eq!(next.due_date.timestamp_subsec_nanos() % 1_000_000, 0);
        }
    }

    #[test]
    fn test_preview_covers_all_ratings() {
        let s = scheduler();
        let preview = s.preview(&review_state(10, 2.5), now());
        assert_eq!(preview[0].0, Rating::Again);
        assert_eq!(preview[0].1.interval, 0);
        assert_eq!(preview[1].1.interval, 12);
        assert_eq!(preview[2].1.interval, 25);
        assert_eq!(preview[3].1.interval, 32);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "now");
        assert_eq!(format_interval(1), "1d");
        assert_eq!(format_interval(5), "5d");
        assert_eq!(format_interval(7), "1w");
        assert_eq!(format_interval(14), "2w");
        assert_eq!(format_interval(30), "1mo");
        assert_eq!(format_interval(90), "3mo");
        assert_eq!(format_interval(365), "1y");
        assert_eq!(format_interval(730), "2y");
    }

    #[test]
    fn test_format_due_in() {
        let t = now();
        assert_eq!(format_due_in(t, t), "now");
        assert_eq!(format_due_in(t, t + Duration::minutes(10)), "10m");
        assert_eq!(format_due_in(t, t + Duration::hours(3)), "3h");
        assert_eq!(format_due_in(t, t + Duration::days(4)), "4d");
    }
}
