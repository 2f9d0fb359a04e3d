//! Spaced repetition scheduling policies.

pub mod confidence;
pub mod standard;

use crate::types::{Confidence, IntervalUnit, ScheduleState};
use chrono::{DateTime, Utc};

/// Trait for long-horizon scheduling policies.
///
/// A policy is a pure function of (state, grade, now). It never fails;
/// the grade is validated before it gets here.
pub trait ReviewScheduler: Send + Sync {
    /// Policy identifier.
    fn name(&self) -> &'static str;

    /// Unit the `interval` field is expressed in under this policy.
    fn interval_unit(&self) -> IntervalUnit;

    /// State for a card that has never been reviewed.
    fn initial_state(&self) -> ScheduleState;

    /// Compute the next schedule state after a review.
    fn review(
        &self,
        state: &ScheduleState,
        confidence: Confidence,
        now: DateTime<Utc>,
    ) -> ScheduleState;
}

/// Get a scheduling policy by name.
pub fn get_scheduler(name: &str) -> Option<Box<dyn ReviewScheduler>> {
    match name {
        "standard" => Some(Box::new(standard::Standard::default())),
        "confidence" => Some(Box::new(confidence::ConfidenceScheduler::default())),
        _ => None,
    }
}
