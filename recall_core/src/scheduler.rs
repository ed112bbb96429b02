//! SM-2 scheduling with Anki-style learning steps.
//!
//! A card is either in the Learning phase (sub-day steps taken from
//! `learning_steps`) or the Review phase (whole-day intervals grown by the
//! ease factor). Each rating moves the card as follows:
//!
//! | phase    | Again              | Hard                 | Good                  | Easy                         |
//! |----------|--------------------|----------------------|-----------------------|------------------------------|
//! | Learning | back to step 0     | repeat current step  | next step / graduate  | graduate at easy interval    |
//! | Review   | lapse, ease -0.20  | I×hard, ease -0.15   | I×ease                | I×ease×bonus, ease +0.15     |
//!
//! Review intervals are also scaled by `interval_modifier`, rounded half-up
//! and clamped to `[1, max_interval_days]`.

use crate::{CardState, Rating, Result, SchedulerConfig};
use chrono::{DateTime, Duration, Utc};

const LAPSE_EASE_PENALTY: f64 = 0.2;
const HARD_EASE_PENALTY: f64 = 0.15;
const EASY_EASE_BONUS: f64 = 0.15;

/// What a rating would do to a card, without committing to it
#[derive(Clone, Debug, PartialEq)]
pub struct ReviewPreview {
    pub rating: Rating,
    /// Time from `now` until the card would be due again
    pub delay: Duration,
    pub state: CardState,
}

/// Transition function over a validated configuration
#[derive(Clone, Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    steps: Vec<Duration>,
}

impl Scheduler {
    /// Validate `config` once so transitions never have to
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let steps = config
            .learning_steps
            .iter()
            .map(|minutes| Duration::minutes(i64::from(*minutes)))
            .collect();
        Ok(Self { config, steps })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Fresh state for a card on first exposure
    pub fn new_card(&self, now: DateTime<Utc>) -> CardState {
        CardState::new(&self.config, now)
    }

    /// Apply `rating` to `state` at `now`
    ///
    /// Fails only with [`crate::Error::InconsistentState`] when the stored
    /// state breaks an invariant; such input is rejected, never repaired.
    pub fn transition(
        &self,
        state: &CardState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<CardState> {
        state.validate(&self.config)?;
        let next = self.apply(state, rating, now);

        tracing::debug!(
            rating = %rating,
            was_learning = state.is_learning,
            is_learning = next.is_learning,
            step = next.step,
            interval = next.interval,
            ease = next.ease_factor,
            "Applied rating"
        );

        Ok(next)
    }

    /// Outcome of every rating for `state`, in Again..Easy order
    pub fn preview(&self, state: &CardState, now: DateTime<Utc>) -> Result<[ReviewPreview; 4]> {
        state.validate(&self.config)?;
        Ok(Rating::ALL.map(|rating| {
            let next = self.apply(state, rating, now);
            ReviewPreview {
                rating,
                delay: next.due_at - now,
                state: next,
            }
        }))
    }

    fn apply(&self, state: &CardState, rating: Rating, now: DateTime<Utc>) -> CardState {
        let mut next = if state.is_learning {
            self.apply_learning(state, rating, now)
        } else {
            self.apply_review(state, rating, now)
        };
        next.last_reviewed_at = Some(now);
        next
    }

    fn apply_learning(&self, state: &CardState, rating: Rating, now: DateTime<Utc>) -> CardState {
        let mut next = state.clone();

        match rating {
            Rating::Again => {
                next.step = 0;
                next.due_at = now + self.steps[0];
            }
            Rating::Hard => {
                next.due_at = now + self.steps[state.step];
            }
            Rating::Good => {
                if state.step >= self.config.last_step_index() {
                    self.graduate(&mut next, self.config.graduating_interval_days, now);
                } else {
                    next.step = state.step + 1;
                    next.due_at = now + self.steps[next.step];
                }
            }
            Rating::Easy => {
                self.graduate(&mut next, self.config.easy_interval_days, now);
            }
        }

        next
    }

    fn graduate(&self, next: &mut CardState, interval: u32, now: DateTime<Utc>) {
        next.is_learning = false;
        next.step = 0;
        next.interval = interval.min(self.config.max_interval_days);
        next.repetitions = 1;
        next.due_at = now + Duration::days(i64::from(next.interval));
    }

    fn apply_review(&self, state: &CardState, rating: Rating, now: DateTime<Utc>) -> CardState {
        let mut next = state.clone();
        let interval = f64::from(state.interval);
        let ease = state.ease_factor;
        let modifier = self.config.interval_modifier;

        let grown = match rating {
            Rating::Again => {
                // Lapse: interval is kept for reference while relearning
                next.is_learning = true;
                next.step = 0;
                next.repetitions = 0;
                next.ease_factor = self.clamp_ease(ease - LAPSE_EASE_PENALTY);
                next.due_at = now + self.steps[0];
                return next;
            }
            Rating::Hard => {
                next.ease_factor = self.clamp_ease(ease - HARD_EASE_PENALTY);
                interval * self.config.hard_interval_factor * modifier
            }
            Rating::Good => interval * ease * modifier,
            Rating::Easy => {
                next.ease_factor = self.clamp_ease(ease + EASY_EASE_BONUS);
                interval * ease * self.config.easy_bonus * modifier
            }
        };

        next.interval = self.clamp_interval(grown);
        next.repetitions = state.repetitions.saturating_add(1);
        next.due_at = now + Duration::days(i64::from(next.interval));
        next
    }

    fn clamp_ease(&self, ease: f64) -> f64 {
        ease.max(self.config.min_ease)
    }

    /// Round half-up to whole days, then clamp to `[1, max_interval_days]`
    fn clamp_interval(&self, days: f64) -> u32 {
        let max = f64::from(self.config.max_interval_days);
        let rounded = (days + 0.5).floor();
        if rounded.is_nan() {
            return 1;
        }
        rounded.clamp(1.0, max) as u32
    }
}

/// Compact label for a scheduling delay: "now", "10m", "3h", "4d", "2w", "3mo", "1y"
pub fn format_interval(delay: Duration) -> String {
    let minutes = delay.num_minutes();
    if minutes <= 0 {
        return "now".to_string();
    }
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = delay.num_hours();
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = delay.num_days();
    if days < 7 {
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
    use crate::Error;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig::default()).unwrap()
    }

    fn review_card(interval: u32, ease: f64, repetitions: u32) -> CardState {
        CardState {
            ease_factor: ease,
            interval,
            step: 0,
            is_learning: false,
            due_at: now(),
            repetitions,
            last_reviewed_at: Some(now() - Duration::days(i64::from(interval))),
        }
    }

    #[test]
    fn test_new_card_good_advances_step() {
        let sched = scheduler();
        let card = sched.new_card(now());

        let next = sched.transition(&card, Rating::Good, now()).unwrap();

        assert!(next.is_learning);
        assert_eq!(next.step, 1);
        assert_eq!(next.due_at, now() + Duration::minutes(10));
        assert_eq!(next.last_reviewed_at, Some(now()));
        assert_eq!(next.ease_factor, 2.5);
    }

    #[test]
    fn test_second_good_graduates() {
        let sched = scheduler();
        let card = sched.new_card(now());
        let first = sched.transition(&card, Rating::Good, now()).unwrap();

        let later = now() + Duration::minutes(10);
        let next = sched.transition(&first, Rating::Good, later).unwrap();

        assert!(!next.is_learning);
        assert_eq!(next.interval, 1);
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.due_at, later + Duration::days(1));
    }

    #[test]
    fn test_review_good_multiplies_by_ease() {
        let sched = scheduler();
        let card = review_card(6, 2.5, 2);

        let next = sched.transition(&card, Rating::Good, now()).unwrap();

        assert_eq!(next.interval, 15);
        assert_eq!(next.due_at, now() + Duration::days(15));
        assert_eq!(next.repetitions, 3);
        assert_eq!(next.ease_factor, 2.5);
    }

    #[test]
    fn test_review_easy_applies_bonus() {
        let sched = scheduler();
        let card = review_card(15, 2.5, 3);

        let next = sched.transition(&card, Rating::Easy, now()).unwrap();

        // 15 * 2.5 * 1.3 = 48.75
        assert_eq!(next.interval, 49);
        assert!((next.ease_factor - 2.65).abs() < 1e-9);
        assert_eq!(next.repetitions, 4);
    }

    #[test]
    fn test_review_again_lapses_and_clamps_ease() {
        let sched = scheduler();
        let card = review_card(10, 1.35, 5);

        let next = sched.transition(&card, Rating::Again, now()).unwrap();

        assert!(next.is_learning);
        assert_eq!(next.step, 0);
        assert_eq!(next.ease_factor, 1.3);
        assert_eq!(next.repetitions, 0);
        assert_eq!(next.interval, 10);
        assert_eq!(next.due_at, now() + Duration::minutes(1));
    }

    #[test]
    fn test_review_hard_uses_hard_factor() {
        let sched = scheduler();
        let card = review_card(10, 2.5, 2);

        let next = sched.transition(&card, Rating::Hard, now()).unwrap();

        assert_eq!(next.interval, 12);
        assert!((next.ease_factor - 2.35).abs() < 1e-9);
        assert_eq!(next.repetitions, 3);
    }

    #[test]
    fn test_interval_modifier_applies_to_hard() {
        let config = SchedulerConfig {
            interval_modifier: 0.5,
            ..SchedulerConfig::default()
        };
        let sched = Scheduler::new(config).unwrap();
        let card = review_card(10, 2.5, 2);

        let hard = sched.transition(&card, Rating::Hard, now()).unwrap();
        assert_eq!(hard.interval, 6); // 10 * 1.2 * 0.5

        let good = sched.transition(&card, Rating::Good, now()).unwrap();
        assert_eq!(good.interval, 13); // 12.5 rounds half-up
    }

    #[test]
    fn test_interval_modifier_ignored_for_learning_steps() {
        let config = SchedulerConfig {
            interval_modifier: 3.0,
            ..SchedulerConfig::default()
        };
        let sched = Scheduler::new(config).unwrap();
        let card = sched.new_card(now());

        let next = sched.transition(&card, Rating::Good, now()).unwrap();
        assert_eq!(next.due_at, now() + Duration::minutes(10));
    }

    #[test]
    fn test_review_interval_never_drops_to_zero() {
        let sched = scheduler();
        let card = review_card(0, 1.3, 1);

        let next = sched.transition(&card, Rating::Hard, now()).unwrap();
        assert_eq!(next.interval, 1);
        assert!(!next.is_learning);
    }

    #[test]
    fn test_review_interval_clamped_to_max() {
        let sched = scheduler();
        let card = review_card(30000, 2.5, 20);

        let next = sched.transition(&card, Rating::Easy, now()).unwrap();
        assert_eq!(next.interval, 36500);
    }

    #[test]
    fn test_learning_hard_repeats_step() {
        let sched = scheduler();
        let mut card = sched.new_card(now());
        card.step = 1;

        let next = sched.transition(&card, Rating::Hard, now()).unwrap();

        assert!(next.is_learning);
        assert_eq!(next.step, 1);
        assert_eq!(next.due_at, now() + Duration::minutes(10));
        assert_eq!(next.ease_factor, card.ease_factor);
    }

    #[test]
    fn test_learning_again_resets_step() {
        let sched = scheduler();
        let mut card = sched.new_card(now());
        card.step = 1;

        let next = sched.transition(&card, Rating::Again, now()).unwrap();

        assert_eq!(next.step, 0);
        assert_eq!(next.due_at, now() + Duration::minutes(1));
        assert_eq!(next.ease_factor, 2.5);
    }

    #[test]
    fn test_easy_graduates_from_any_step() {
        let config = SchedulerConfig {
            learning_steps: vec![1, 10, 60, 360],
            ..SchedulerConfig::default()
        };
        let sched = Scheduler::new(config).unwrap();

        for step in 0..4 {
            let mut card = sched.new_card(now());
            card.step = step;
            let next = sched.transition(&card, Rating::Easy, now()).unwrap();
            assert!(!next.is_learning);
            assert_eq!(next.interval, 4);
            assert_eq!(next.repetitions, 1);
            assert_eq!(next.due_at, now() + Duration::days(4));
        }
    }

    #[test]
    fn test_single_step_good_graduates_immediately() {
        let config = SchedulerConfig {
            learning_steps: vec![5],
            ..SchedulerConfig::default()
        };
        let sched = Scheduler::new(config).unwrap();
        let card = sched.new_card(now());

        let next = sched.transition(&card, Rating::Good, now()).unwrap();
        assert!(!next.is_learning);
        assert_eq!(next.interval, 1);
    }

    #[test]
    fn test_relearning_graduates_at_graduating_interval() {
        let sched = scheduler();
        let lapsed = sched
            .transition(&review_card(40, 2.5, 4), Rating::Again, now())
            .unwrap();
        let step1 = sched.transition(&lapsed, Rating::Good, now()).unwrap();
        let graduated = sched.transition(&step1, Rating::Good, now()).unwrap();

        assert!(!graduated.is_learning);
        assert_eq!(graduated.interval, 1);
        assert_eq!(graduated.repetitions, 1);
        assert!((graduated.ease_factor - 2.3).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_inconsistent_state() {
        crate::logging::init_test();
        let sched = scheduler();
        let mut card = sched.new_card(now());
        card.step = 7;

        let result = sched.transition(&card, Rating::Good, now());
        assert!(matches!(result, Err(Error::InconsistentState(_))));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SchedulerConfig {
            learning_steps: vec![],
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            Scheduler::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_transition_is_deterministic() {
        let sched = scheduler();
        let card = review_card(8, 2.1, 3);

        for rating in Rating::ALL {
            let a = sched.transition(&card, rating, now()).unwrap();
            let b = sched.transition(&card, rating, now()).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_preview_new_card() {
        let sched = scheduler();
        let card = sched.new_card(now());

        let preview = sched.preview(&card, now()).unwrap();
        let labels: Vec<_> = preview.iter().map(|p| format_interval(p.delay)).collect();

        assert_eq!(labels, vec!["1m", "1m", "10m", "4d"]);
        assert_eq!(preview[3].rating, Rating::Easy);
        assert!(!preview[3].state.is_learning);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::zero()), "now");
        assert_eq!(format_interval(Duration::minutes(10)), "10m");
        assert_eq!(format_interval(Duration::hours(6)), "6h");
        assert_eq!(format_interval(Duration::days(1)), "1d");
        assert_eq!(format_interval(Duration::days(15)), "2w");
        assert_eq!(format_interval(Duration::days(49)), "1mo");
        assert_eq!(format_interval(Duration::days(800)), "2y");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_rating() -> impl Strategy<Value = Rating> {
            prop_oneof![
                Just(Rating::Again),
                Just(Rating::Hard),
                Just(Rating::Good),
                Just(Rating::Easy),
            ]
        }

        fn arb_state() -> impl Strategy<Value = CardState> {
            (
                1.3f64..5.0,
                0u32..=36500,
                0usize..2,
                any::<bool>(),
                0u32..100,
            )
                .prop_map(|(ease, interval, step, is_learning, repetitions)| CardState {
                    ease_factor: ease,
                    interval,
                    step,
                    is_learning,
                    due_at: now(),
                    repetitions,
                    last_reviewed_at: None,
                })
        }

        proptest! {
            // Property: every output satisfies the state invariants
            #[test]
            fn prop_transition_preserves_invariants(
                state in arb_state(),
                rating in arb_rating(),
            ) {
                let sched = scheduler();
                let next = sched.transition(&state, rating, now()).unwrap();
                prop_assert!(next.validate(sched.config()).is_ok());
                prop_assert!(next.due_at >= now());
                if !next.is_learning {
                    prop_assert!(next.interval >= 1);
                }
            }

            // Property: repeated Again/Hard never push ease below the floor
            #[test]
            fn prop_ease_never_below_minimum(
                ratings in proptest::collection::vec(
                    prop_oneof![Just(Rating::Again), Just(Rating::Hard)],
                    1..60,
                ),
            ) {
                let sched = scheduler();
                let mut state = review_card(20, 2.5, 3);
                for rating in ratings {
                    state = sched.transition(&state, rating, now()).unwrap();
                    prop_assert!(state.ease_factor >= sched.config().min_ease);
                    if state.is_learning {
                        // Graduate again so Review-phase penalties keep applying
                        state = sched.transition(&state, Rating::Easy, now()).unwrap();
                    }
                }
            }

            // Property: Easy on a new card graduates to the easy interval
            #[test]
            fn prop_easy_graduates_new_card(steps in proptest::collection::vec(1u32..1440, 1..8)) {
                let config = SchedulerConfig {
                    learning_steps: steps,
                    ..SchedulerConfig::default()
                };
                let sched = Scheduler::new(config).unwrap();
                let next = sched
                    .transition(&sched.new_card(now()), Rating::Easy, now())
                    .unwrap();
                prop_assert!(!next.is_learning);
                prop_assert_eq!(next.interval, sched.config().easy_interval_days);
            }

            // Property: identical inputs give identical outputs
            #[test]
            fn prop_transition_deterministic(state in arb_state(), rating in arb_rating()) {
                let sched = scheduler();
                let a = sched.transition(&state, rating, now()).unwrap();
                let b = sched.transition(&state, rating, now()).unwrap();
                prop_assert_eq!(a, b);
            }
        }
    }
}
