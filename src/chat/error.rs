use thiserror::Error;

/// Reasons a chat operation was rejected or failed.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Please select a model first.")]
    NoModelSelected,
    #[error("Please enter a message.")]
    EmptyPrompt,
    #[error("No chat is selected.")]
    NoActiveChat,
    #[error("Unknown chat {0}")]
    UnknownChat(String),
    #[error("A response is still streaming in {0}")]
    StreamInFlight(String),
    #[error("No response is streaming")]
    NotStreaming,
    #[error("No message {0} in this chat")]
    UnknownMessage(usize),
    #[error("No code block {0} in this message")]
    UnknownCodeBlock(usize),
    #[error("{status} {reason}")]
    HttpStatus { status: u16, reason: String },
    #[error("{0}")]
    Server(String),
    #[error("Cancelled")]
    Cancelled,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}
