//! Mastery session engine.
//!
//! Drives one bounded drilling session over a fixed card set. Missed cards
//! are re-surfaced a few positions ahead; a top grade graduates the card
//! out of the live queue. Queue arithmetic and per-card state updates are
//! pure; the caller owns loading and persisting session rows.

use chrono::{DateTime, Utc};

use crate::error::SessionError;
use crate::types::{Confidence, MasteryCardState};

/// Outcome of removing/reinserting the current card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStep {
    /// Index of the next current card. Meaningless when `empty` is set.
    pub next_index: usize,
    /// The live queue has been exhausted.
    pub empty: bool,
}

/// Mastery engine with configurable thresholds.
#[derive(Debug, Clone)]
pub struct MasteryEngine {
    /// Top-grade count that marks a card mastered.
    pub fives_to_master: u32,
    /// Consecutive-good streak that marks a card mastered.
    pub streak_to_master: u32,
    /// Reinsertion distance for grades 1-4. Grade 5 graduates instead.
    pub reinsert_offsets: [usize; 4],
}

impl Default for MasteryEngine {
    fn default() -> Self {
        Self {
            fives_to_master: 2,
            streak_to_master: 2,
            reinsert_offsets: [2, 4, 8, 15],
        }
    }
}

impl MasteryEngine {
    /// Build the initial queue from the candidate set, preserving order.
    pub fn build_order<T: PartialEq>(cards: Vec<T>) -> Result<Vec<T>, SessionError> {
        let mut order: Vec<T> = Vec::with_capacity(cards.len());
        for card in cards {
            if !order.contains(&card) {
                order.push(card);
            }
        }
        if order.is_empty() {
            return Err(SessionError::EmptyCardSet);
        }
        Ok(order)
    }

    /// Reject stale or duplicate submissions before any state changes.
    pub fn check_submission<T: PartialEq>(
        order: &[T],
        current_index: usize,
        submitted: &T,
        ended: bool,
    ) -> Result<(), SessionError> {
        if ended {
            return Err(SessionError::AlreadyEnded);
        }
        match order.get(current_index) {
            Some(current) if current == submitted => Ok(()),
            _ => Err(SessionError::WrongCard),
        }
    }

    /// Apply a grade to a card's mastery state.
    pub fn rate(
        &self,
        state: &MasteryCardState,
        confidence: Confidence,
        now: DateTime<Utc>,
    ) -> MasteryCardState {
        let grade = confidence.get();
        let mut next = state.clone();
        next.review_count += 1;
        next.last_reviewed = Some(now);

        if confidence.is_lapse() {
            next.lapses += 1;
            next.consecutive_good = 0;
        } else if grade >= 4 {
            next.consecutive_good += 1;
            if grade == 5 {
                next.five_count += 1;
            }
        } else {
            next.consecutive_good = 0;
        }

        // Monotonic: only ever set, never cleared.
        if next.five_count >= self.fives_to_master || next.consecutive_good >= self.streak_to_master
        {
            next.mastered = true;
        }

        next.mastery_level = if next.mastered {
            100
        } else {
            state.mastery_level.max(grade as u32 * 20)
        };

        next
    }

    /// Remove the current card and reinsert it further down unless the
    /// grade graduates it. Returns where the queue pointer lands.
    pub fn step_queue<T: PartialEq>(
        &self,
        order: &mut Vec<T>,
        current_index: usize,
        confidence: Confidence,
    ) -> QueueStep {
        let card = order.remove(current_index);
        let grade = confidence.get();
        if grade < 5 {
            let offset = self.reinsert_offsets[(grade - 1) as usize];
            let at = (current_index + offset).min(order.len());
            order.insert(at, card);
        }
        if order.is_empty() {
            QueueStep {
                next_index: 0,
                empty: true,
            }
        } else {
            QueueStep {
                next_index: current_index.min(order.len() - 1),
                empty: false,
            }
        }
    }
}
