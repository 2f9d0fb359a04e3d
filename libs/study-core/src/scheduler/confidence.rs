//! Confidence-graded scheduler.
//!
//! Takes the raw 1-5 grade instead of collapsing it to four ratings.
//! Minute-granularity intervals: success grows the interval by a
//! rating-specific multiplier scaled by sqrt(ease), a lapse returns the
//! card to a short learning step.

use super::ReviewScheduler;
use crate::types::{Confidence, IntervalUnit, ScheduleState, ScheduleStatus};
use chrono::{DateTime, Duration, Utc};

/// Confidence scheduler with configurable parameters.
#[derive(Debug, Clone)]
pub struct ConfidenceScheduler {
    pub minimum_ease: f64,
    pub maximum_ease: f64,
    /// Delay after a lapse, in minutes.
    pub learning_step_minutes: i64,
    /// Interval granted when a card graduates out of learning, in minutes.
    pub graduating_interval_minutes: i64,
    /// Growth multipliers for grades 3, 4, 5.
    pub multipliers: [f64; 3],
}

impl Default for ConfidenceScheduler {
    fn default() -> Self {
        Self {
            minimum_ease: 1.3,
            maximum_ease: 2.8,
            learning_step_minutes: 1,
            graduating_interval_minutes: 1,
            multipliers: [1.2, 1.6, 2.6],
        }
    }
}

impl ReviewScheduler for ConfidenceScheduler {
    fn name(&self) -> &'static str {
        "confidence"
    }

    fn interval_unit(&self) -> IntervalUnit {
        IntervalUnit::Minutes
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
        if confidence.is_lapse() {
            return ScheduleState {
                status: ScheduleStatus::Learning,
                interval: 0,
                ease_factor: self.bump_ease(state.ease_factor, confidence),
                repetitions: 0,
                lapses: state.lapses + 1,
                due_at: Some(now + Duration::minutes(self.learning_step_minutes)),
            };
        }

        let repetitions = state.repetitions + 1;
        let interval = if repetitions == 1 && state.interval <= 0 {
            self.graduating_interval_minutes
        } else {
            let ef_scale = state.ease_factor.max(self.minimum_ease).sqrt();
            let raw = state.interval.max(1) as f64 * self.multiplier(confidence) * ef_scale;
            (raw.round() as i64).max(1)
        };

        ScheduleState {
            status: ScheduleStatus::Review,
            interval,
            ease_factor: self.bump_ease(state.ease_factor, confidence),
            repetitions,
            lapses: state.lapses,
            due_at: Some(now + Duration::minutes(interval)),
        }
    }
}

impl ConfidenceScheduler {
    fn multiplier(&self, confidence: Confidence) -> f64 {
        self.multipliers[(confidence.get() - 3) as usize]
    }

    /// SM-2 ease delta, clamped to the allowed band.
    fn bump_ease(&self, ease: f64, confidence: Confidence) -> f64 {
        let q = confidence.get() as f64;
        let delta = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
        (ease + delta).clamp(self.minimum_ease, self.maximum_ease)
    }
}
