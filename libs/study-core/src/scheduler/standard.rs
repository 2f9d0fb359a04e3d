//! Standard four-rating scheduler.
//!
//! SM-2 derived, day-granularity intervals. A lapse parks the card in a
//! short relearning step instead of a full day.

use super::ReviewScheduler;
use crate::types::{Confidence, IntervalUnit, Rating, ScheduleState, ScheduleStatus};
use chrono::{DateTime, Duration, Utc};

/// Standard scheduler with configurable parameters.
#[derive(Debug, Clone)]
pub struct Standard {
    pub minimum_ease: f64,
    pub maximum_ease: f64,
    /// Ease penalty on a lapse.
    pub lapse_ease_step: f64,
    /// Ease penalty on a hard recall.
    pub hard_ease_step: f64,
    /// Ease reward on an easy recall.
    pub easy_ease_step: f64,
    pub hard_multiplier: f64,
    pub easy_multiplier: f64,
    /// Interval after the second consecutive good recall, in days.
    pub second_good_interval: i64,
    /// Interval after the second consecutive easy recall, in days.
    pub second_easy_interval: i64,
    /// Relearning delay after a lapse, in minutes.
    pub relearn_minutes: i64,
}

impl Default for Standard {
    fn default() -> Self {
        Self {
            minimum_ease: 1.3,
            maximum_ease: 2.8,
            lapse_ease_step: 0.20,
            hard_ease_step: 0.15,
            easy_ease_step: 0.15,
            hard_multiplier: 1.2,
            easy_multiplier: 1.3,
            second_good_interval: 3,
            second_easy_interval: 4,
            relearn_minutes: 10,
        }
    }
}

impl ReviewScheduler for Standard {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn interval_unit(&self) -> IntervalUnit {
        IntervalUnit::Days
    }

    fn initial_state(&self) -> ScheduleState {
        ScheduleState::default()
    }

    fn review(
        &self,
        state: &ScheduleState,
        confidence: Confidence,
        now: DateTime<Utc>,
    ) -> ScheduleState {
        self.review_rating(state, Rating::from_confidence(confidence), now)
    }
}

impl Standard {
    /// Apply a four-point rating directly.
    pub fn review_rating(
        &self,
        state: &ScheduleState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> ScheduleState {
        match rating {
            Rating::Again => ScheduleState {
                status: ScheduleStatus::Learning,
                interval: 0,
                ease_factor: (state.ease_factor - self.lapse_ease_step).max(self.minimum_ease),
                repetitions: 0,
                lapses: state.lapses + 1,
                due_at: Some(now + Duration::minutes(self.relearn_minutes)),
            },
            Rating::Hard => {
                let interval = if state.interval == 0 {
                    1
                } else {
                    scale(state.interval, self.hard_multiplier)
                };
                ScheduleState {
                    status: ScheduleStatus::Review,
                    interval,
                    ease_factor: (state.ease_factor - self.hard_ease_step).max(self.minimum_ease),
                    repetitions: state.repetitions + 1,
                    lapses: state.lapses,
                    due_at: Some(now + Duration::days(interval)),
                }
            }
            Rating::Good => {
                let repetitions = state.repetitions + 1;
                let interval = match repetitions {
                    1 => 1,
                    2 => self.second_good_interval,
                    _ => scale(state.interval, state.ease_factor),
                };
                ScheduleState {
                    status: ScheduleStatus::Review,
                    interval,
                    ease_factor: state.ease_factor,
                    repetitions,
                    lapses: state.lapses,
                    due_at: Some(now + Duration::days(interval)),
                }
            }
            Rating::Easy => {
                let ease_factor = (state.ease_factor + self.easy_ease_step).min(self.maximum_ease);
                let repetitions = state.repetitions + 1;
                let interval = match repetitions {
                    1 => 1,
                    2 => self.second_easy_interval,
                    _ => scale(state.interval, ease_factor * self.easy_multiplier),
                };
                ScheduleState {
                    status: ScheduleStatus::Review,
                    interval,
                    ease_factor,
                    repetitions,
                    lapses: state.lapses,
                    due_at: Some(now + Duration::days(interval)),
                }
            }
        }
    }
}

fn scale(interval: i64, factor: f64) -> i64 {
    ((interval as f64 * factor).round() as i64).max(1)
}
