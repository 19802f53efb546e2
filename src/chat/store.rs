//! In-memory chats and the exchanges within them.
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::ChatError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ExchangeStatus {
    Streaming,
    Complete,
    Failed,
}

/// One question and the answer streamed back for it.
#[derive(Clone, Debug, Serialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub model: String,
    pub status: ExchangeStatus,
    pub asked_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Chat {
    pub id: String,
    pub name: String,
    pub messages: Vec<Exchange>,
}

impl Chat {
    /// Whether the last exchange is still receiving its answer.
    pub fn in_flight(&self) -> bool {
        self.messages
            .last()
            .is_some_and(|e| e.status == ExchangeStatus::Streaming)
    }
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    // Kept in creation order
    chats: Vec<Chat>,
    active: Option<String>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty chat with a fresh id and make it active.
    pub fn create_chat(&mut self) -> &Chat {
        let id = Uuid::new_v4().to_string();
        let name = format!("Chat {}", self.chats.len() + 1);
        self.chats.push(Chat {
            id: id.clone(),
            name,
            messages: Vec::new(),
        });
        self.active = Some(id);
        &self.chats[self.chats.len() - 1]
    }

    pub fn select_chat(&mut self, id: &str) -> Result<&Chat, ChatError> {
        let chat = self
            .chats
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ChatError::UnknownChat(id.to_string()))?;
        self.active = Some(chat.id.clone());
        Ok(chat)
    }

    /// Clear the messages of a chat, keeping its id and name.
    pub fn reset_chat(&mut self, id: &str) -> Result<(), ChatError> {
        let chat = self.get_mut(id)?;
        if chat.in_flight() {
            return Err(ChatError::StreamInFlight(chat.name.clone()));
        }
        chat.messages.clear();
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Chat, ChatError> {
        self.chats
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ChatError::UnknownChat(id.to_string()))
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&Chat> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    fn active_mut(&mut self) -> Result<&mut Chat, ChatError> {
        let id = self.active.clone().ok_or(ChatError::NoActiveChat)?;
        self.get_mut(&id)
    }

    /// Push a new exchange with an empty answer onto the active chat,
    /// returning its index. Rejected while another answer is streaming
    /// in the same chat.
    pub fn append_exchange(&mut self, question: &str, model: &str) -> Result<usize, ChatError> {
        let chat = self.active_mut()?;
        if chat.in_flight() {
            return Err(ChatError::StreamInFlight(chat.name.clone()));
        }
        chat.messages.push(Exchange {
            question: question.to_string(),
            answer: String::new(),
            model: model.to_string(),
            status: ExchangeStatus::Streaming,
            asked_at: Utc::now(),
        });
        Ok(chat.messages.len() - 1)
    }

    fn streaming_exchange(&mut self) -> Result<&mut Exchange, ChatError> {
        self.active_mut()?
            .messages
            .last_mut()
            .filter(|e| e.status == ExchangeStatus::Streaming)
            .ok_or(ChatError::NotStreaming)
    }

    /// Append a decoded fragment to the answer being streamed in the
    /// active chat.
    pub fn append_to_answer(&mut self, fragment: &str) -> Result<(), ChatError> {
        self.streaming_exchange()?.answer.push_str(fragment);
        Ok(())
    }

    /// Mark the streaming answer as complete.
    pub fn finish_exchange(&mut self) -> Result<(), ChatError> {
        self.streaming_exchange()?.status = ExchangeStatus::Complete;
        Ok(())
    }

    /// Mark the streaming answer as failed. Whatever arrived so far is
    /// kept and the error is appended to it.
    pub fn fail_exchange(&mut self, error: &str) -> Result<(), ChatError> {
        let exchange = self.streaming_exchange()?;
        if exchange.answer.is_empty() {
            exchange.answer = format!("Error: {}", error);
        } else {
            exchange.answer = format!("{}\n\nError: {}", exchange.answer, error);
        }
        exchange.status = ExchangeStatus::Failed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_chat_becomes_active() {
        let mut store = ConversationStore::new();
        let first = store.create_chat().id.clone();
        let second = store.create_chat().id.clone();

        assert_ne!(first, second);
        assert_eq!(store.active_id(), Some(second.as_str()));
        assert_eq!(store.chats()[0].name, "Chat 1");
        assert_eq!(store.chats()[1].name, "Chat 2");
    }

    #[test]
    fn test_append_then_reset() {
        let mut store = ConversationStore::new();
        let id = store.create_chat().id.clone();

        store.append_exchange("q", "m1").unwrap();
        assert_eq!(store.active().unwrap().messages.len(), 1);
        store.finish_exchange().unwrap();

        store.reset_chat(&id).unwrap();
        let chat = store.active().unwrap();
        assert_eq!(chat.messages.len(), 0);
        assert_eq!(chat.id, id);
        assert_eq!(chat.name, "Chat 1");
    }

    #[test]
    fn test_select_chat_does_not_mutate() {
        let mut store = ConversationStore::new();
        let first = store.create_chat().id.clone();
        store.append_exchange("q", "m1").unwrap();
        store.finish_exchange().unwrap();
        store.create_chat();

        let chat = store.select_chat(&first).unwrap();
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(store.active_id(), Some(first.as_str()));
        assert!(matches!(
            store.select_chat("missing"),
            Err(ChatError::UnknownChat(_))
        ));
        assert_eq!(store.active_id(), Some(first.as_str()));
    }

    #[test]
    fn test_append_requires_active_chat() {
        let mut store = ConversationStore::new();
        assert!(matches!(
            store.append_exchange("q", "m1"),
            Err(ChatError::NoActiveChat)
        ));
    }

    #[test]
    fn test_one_exchange_in_flight_per_chat() {
        let mut store = ConversationStore::new();
        let id = store.create_chat().id.clone();
        store.append_exchange("first", "m1").unwrap();

        assert!(matches!(
            store.append_exchange("second", "m1"),
            Err(ChatError::StreamInFlight(_))
        ));
        assert!(matches!(
            store.reset_chat(&id),
            Err(ChatError::StreamInFlight(_))
        ));
        assert_eq!(store.active().unwrap().messages.len(), 1);

        store.finish_exchange().unwrap();
        assert_eq!(store.append_exchange("second", "m1").unwrap(), 1);
    }

    #[test]
    fn test_answer_accumulates_until_finished() {
        let mut store = ConversationStore::new();
        store.create_chat();
        store.append_exchange("Hello", "m1").unwrap();
        store.append_to_answer("Hi").unwrap();
        store.append_to_answer(" there").unwrap();
        store.finish_exchange().unwrap();

        let exchange = &store.active().unwrap().messages[0];
        assert_eq!(exchange.answer, "Hi there");
        assert_eq!(exchange.status, ExchangeStatus::Complete);
        assert!(matches!(
            store.append_to_answer("late"),
            Err(ChatError::NotStreaming)
        ));
    }

    #[test]
    fn test_fail_exchange_keeps_partial_answer() {
        let mut store = ConversationStore::new();
        store.create_chat();
        store.append_exchange("a", "m1").unwrap();
        store.fail_exchange("500 Internal Server Error").unwrap();
        store.append_exchange("b", "m1").unwrap();
        store.append_to_answer("partial").unwrap();
        store.fail_exchange("connection reset").unwrap();

        let messages = &store.active().unwrap().messages;
        assert_eq!(messages[0].answer, "Error: 500 Internal Server Error");
        assert_eq!(messages[1].answer, "partial\n\nError: connection reset");
        assert_eq!(messages[1].status, ExchangeStatus::Failed);
    }
}
