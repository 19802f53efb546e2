//! A `ChatView` for line-oriented terminals.
//!
//! A terminal can't redraw earlier output, so streamed answers are
//! printed as their raw text grows and the rendered HTML is only kept
//! for export. Toggling the raw view prints the message's full text.
use std::io::Write;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::store::Chat;
use super::view::{ChatView, Clipboard};

pub struct TerminalView<W: Write> {
    out: W,
    // Bytes of the current answer already printed
    printed: usize,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn alert(&mut self, msg: &str) {
        self.write(&format!("! {}\n", msg));
    }

    fn notice(&mut self, msg: &str) {
        self.write(&format!("* {}\n", msg));
    }

    fn show_chat(&mut self, chat: &Chat) {
        let mut text = format!("== {} ==\n", chat.name);
        for (i, exchange) in chat.messages.iter().enumerate() {
            text.push_str(&format!("[{}] you> {}\n", i, exchange.question));
            text.push_str(&format!("[{}] {}> {}\n", i, exchange.model, exchange.answer.trim_end()));
        }
        self.write(&text);
    }

    fn show_question(&mut self, _chat_id: &str, index: usize, question: &str) {
        self.write(&format!("[{}] you> {}\n", index, question));
    }

    fn begin_answer(&mut self, _chat_id: &str, index: usize) {
        self.printed = 0;
        self.write(&format!("[{}] ...\n", index));
    }

    fn update_answer(&mut self, _chat_id: &str, _index: usize, raw: &str, _html: &str) {
        // Answers only grow, but start over if that ever stops holding
        let new = match raw.get(self.printed..) {
            Some(new) => new.to_string(),
            None => format!("\n{}", raw),
        };
        self.printed = raw.len();
        self.write(&new);
    }

    fn end_answer(&mut self, _chat_id: &str, _index: usize) {
        self.printed = 0;
        self.write("\n");
    }

    fn set_raw_visible(&mut self, _chat_id: &str, index: usize, raw: &str, visible: bool) {
        if visible {
            self.write(&format!("--- raw output [{}] ---\n{}\n--- end ---\n", index, raw));
        } else {
            self.write(&format!("* raw output [{}] hidden\n", index));
        }
    }

    fn scroll_to_bottom(&mut self) {}
}

/// Copies through the OSC 52 escape sequence, which most terminal
/// emulators forward to the system clipboard, including over ssh.
pub struct Osc52Clipboard<W: Write> {
    out: W,
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Clipboard for Osc52Clipboard<W> {
    fn copy(&mut self, text: &str) -> Result<()> {
        write!(self.out, "\x1b]52;c;{}\x07", STANDARD.encode(text))?;
        self.out.flush()?;
        Ok(())
    }
}
