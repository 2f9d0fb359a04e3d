//! Error types for study-core.

use thiserror::Error;

/// Result type alias using SessionError.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Precondition failures when driving a mastery session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session has no cards")]
    EmptyCardSet,

    #[error("session already ended")]
    AlreadyEnded,

    #[error("submitted card is not the current card")]
    WrongCard,
}
