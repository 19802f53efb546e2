//! The chat client: stream decoding, Markdown rendering, conversation
//! state and the controller that ties them to a view.
mod client;
mod controller;
pub mod decoder;
mod error;
pub mod export;
pub mod markdown;
mod store;
pub mod terminal;
mod view;

pub use client::{ChatClient, PayloadStream};
pub use controller::{CancelHandle, CancelToken, ChatController, ClientState, cancel_pair};
pub use decoder::{StreamDecoder, decode_stream};
pub use error::ChatError;
pub use store::{Chat, ConversationStore, Exchange, ExchangeStatus};
pub use view::{ChatView, Clipboard};
