use parley_core::BackendError;
use parley_session::SessionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConversationError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Query is empty")]
    EmptyQuery,
}
