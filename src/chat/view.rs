//! Render targets the controller drives.
//!
//! Messages are addressed by chat id and their index within the chat.
use anyhow::Result;

use super::store::Chat;

pub trait ChatView {
    /// Show a message that needs the user's attention (rejected input,
    /// server-reported failures, clipboard outcomes).
    fn alert(&mut self, msg: &str);

    /// Show an informational line in the message list.
    fn notice(&mut self, msg: &str);

    /// Replace the message list with the contents of `chat`.
    fn show_chat(&mut self, chat: &Chat);

    fn show_question(&mut self, chat_id: &str, index: usize, question: &str);

    /// Add an empty assistant message with a streaming indicator.
    fn begin_answer(&mut self, chat_id: &str, index: usize);

    /// Update both the raw text and the rendered HTML of a message.
    fn update_answer(&mut self, chat_id: &str, index: usize, raw: &str, html: &str);

    /// Remove the streaming indicator of a message.
    fn end_answer(&mut self, chat_id: &str, index: usize);

    fn set_raw_visible(&mut self, chat_id: &str, index: usize, raw: &str, visible: bool);

    fn scroll_to_bottom(&mut self);
}

pub trait Clipboard {
    fn copy(&mut self, text: &str) -> Result<()>;
}
