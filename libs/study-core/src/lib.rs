//! Core study engines shared by the backend service and worker.
//!
//! Provides:
//! - Long-horizon spaced repetition schedulers (standard four-rating,
//!   confidence-graded) behind a common trait
//! - Mastery session engine (per-card mastery state + adaptive queue)
//! - Shared types (ScheduleState, Confidence, Rating, etc.)
//!
//! Everything here is pure: engines take state in and hand new state back.
//! Persistence is the caller's concern.

pub mod error;
pub mod mastery;
pub mod scheduler;
pub mod types;

pub use error::{Result, SessionError};
pub use mastery::{MasteryEngine, QueueStep};
pub use scheduler::{get_scheduler, ReviewScheduler};
pub use types::{
    Confidence, IntervalUnit, MasteryCardState, Rating, ScheduleState, ScheduleStatus,
};
