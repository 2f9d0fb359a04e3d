//! Core types for review scheduling and mastery sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a card in the long-horizon scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    New,
    Learning,
    Review,
}

impl Default for ScheduleStatus {
    fn default() -> Self {
        Self::New
    }
}

/// Four-point recall rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    /// Convert to numeric value (1-4).
    pub fn to_value(self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Create from numeric value (1-4).
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }

    /// Collapse a 1-5 confidence grade onto the four-point scale.
    /// 1 -> Again, 2 -> Hard, 3 -> Good, 4 and 5 -> Easy.
    pub fn from_confidence(confidence: Confidence) -> Self {
        match confidence.get() {
            1 => Self::Again,
            2 => Self::Hard,
            3 => Self::Good,
            _ => Self::Easy,
        }
    }
}

/// A validated 1-5 confidence grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(u8);

impl Confidence {
    /// Validate a raw grade. Values outside 1..=5 are rejected.
    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether this grade counts as a lapse (forgot the card).
    pub fn is_lapse(self) -> bool {
        self.0 <= 2
    }
}

/// Unit of the `interval` field, fixed per scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Days,
    Minutes,
}

/// Long-horizon schedule state for one (card, user) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub status: ScheduleStatus,
    /// Interval until the next review, in the policy's unit.
    pub interval: i64,
    pub ease_factor: f64,
    /// Consecutive non-lapse reviews.
    pub repetitions: u32,
    /// Cumulative lapse count.
    pub lapses: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            status: ScheduleStatus::New,
            interval: 0,
            ease_factor: 2.5,
            repetitions: 0,
            lapses: 0,
            due_at: None,
        }
    }
}

/// Session-local mastery state for one (card, user) pair.
///
/// `mastered` is monotonic: once set it stays set until an explicit reset
/// wipes the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryCardState {
    /// 0-100 confidence score, non-decreasing while unmastered.
    pub mastery_level: u32,
    pub review_count: u32,
    pub consecutive_good: u32,
    pub five_count: u32,
    pub lapses: u32,
    pub mastered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
}

impl Default for MasteryCardState {
    fn default() -> Self {
        Self {
            mastery_level: 0,
            review_count: 0,
            consecutive_good: 0,
            five_count: 0,
            lapses: 0,
            mastered: false,
            last_reviewed: None,
        }
    }
}
