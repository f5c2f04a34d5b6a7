use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Turns were appended for a user that has no session (never created,
    /// or evicted).
    #[error("no session exists for user: {0}")]
    UnknownUser(String),
}
