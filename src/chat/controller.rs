//! Drives a chat: validates input, streams answers into the store and
//! keeps the view in sync.
use std::collections::HashSet;

use futures_util::StreamExt;
use tokio::sync::watch;

use super::client::ChatClient;
use super::markdown;
use super::store::{Chat, ConversationStore};
use super::view::{ChatView, Clipboard};
use super::ChatError;
use crate::api::public::chat::StreamChatRequest;

/// Everything the controller reads and writes besides its view.
#[derive(Debug, Default)]
pub struct ClientState {
    pub store: ConversationStore,
    pub selected_model: Option<String>,
    // Messages whose raw text is shown, by chat id and index
    raw_visible: HashSet<(String, usize)>,
}

impl ClientState {
    pub fn is_raw_visible(&self, chat_id: &str, index: usize) -> bool {
        self.raw_visible.contains(&(chat_id.to_string(), index))
    }
}

/// Aborts the send it was created for.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// Resolves once `cancel` is called. Never resolves if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

pub struct ChatController<V: ChatView, C: Clipboard> {
    state: ClientState,
    client: ChatClient,
    view: V,
    clipboard: C,
}

impl<V: ChatView, C: Clipboard> ChatController<V, C> {
    pub fn new(client: ChatClient, view: V, clipboard: C) -> Self {
        Self {
            state: ClientState::default(),
            client,
            view,
            clipboard,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    pub fn select_model(&mut self, model: &str) -> Result<(), ChatError> {
        let model = model.trim();
        if model.is_empty() {
            self.view.alert(&ChatError::NoModelSelected.to_string());
            return Err(ChatError::NoModelSelected);
        }
        self.state.selected_model = Some(model.to_string());
        self.view.notice(&format!("Model selected: {}", model));
        self.view.scroll_to_bottom();
        Ok(())
    }

    pub fn new_chat(&mut self) -> String {
        let chat = self.state.store.create_chat();
        tracing::debug!("Created chat {}", chat.id);
        self.view.show_chat(chat);
        chat.id.clone()
    }

    pub fn select_chat(&mut self, chat_id: &str) -> Result<(), ChatError> {
        match self.state.store.select_chat(chat_id) {
            Ok(chat) => {
                self.view.show_chat(chat);
                Ok(())
            }
            Err(e) => {
                self.view.alert(&e.to_string());
                Err(e)
            }
        }
    }

    /// Reset the active chat on the server, then clear it locally. A
    /// failure leaves the local chat untouched.
    pub async fn reset_chat(&mut self) -> Result<(), ChatError> {
        let Some(chat_id) = self.state.store.active_id().map(String::from) else {
            self.view.alert(&ChatError::NoActiveChat.to_string());
            return Err(ChatError::NoActiveChat);
        };
        if let Some(chat) = self.state.store.active().filter(|c| c.in_flight()) {
            let err = ChatError::StreamInFlight(chat.name.clone());
            self.view.alert(&err.to_string());
            return Err(err);
        }

        if let Err(e) = self.client.reset_chat(&chat_id).await {
            tracing::warn!("Reset of chat {} failed: {}", chat_id, e);
            self.view.alert(&e.to_string());
            return Err(e);
        }

        self.state.store.reset_chat(&chat_id)?;
        self.state.raw_visible.retain(|(id, _)| *id != chat_id);
        if let Some(chat) = self.state.store.get(&chat_id) {
            self.view.show_chat(chat);
        }
        Ok(())
    }

    /// Send a prompt in the active chat and stream the answer.
    pub async fn send(&mut self, prompt: &str) -> Result<(), ChatError> {
        // The handle is dropped here, so this token never fires
        let (_, token) = cancel_pair();
        self.send_with_cancel(prompt, token).await
    }

    /// Like `send`, aborting the stream when `cancel` fires. A
    /// cancelled answer keeps what arrived and is marked failed.
    pub async fn send_with_cancel(
        &mut self,
        prompt: &str,
        mut cancel: CancelToken,
    ) -> Result<(), ChatError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            self.view.alert(&ChatError::EmptyPrompt.to_string());
            return Err(ChatError::EmptyPrompt);
        }
        let Some(model) = self.state.selected_model.clone() else {
            self.view.alert(&ChatError::NoModelSelected.to_string());
            return Err(ChatError::NoModelSelected);
        };

        if self.state.store.active().is_none() {
            self.new_chat();
        }
        let index = match self.state.store.append_exchange(prompt, &model) {
            Ok(index) => index,
            Err(e) => {
                self.view.alert(&e.to_string());
                return Err(e);
            }
        };
        let chat_id = self
            .state
            .store
            .active_id()
            .map(String::from)
            .ok_or(ChatError::NoActiveChat)?;

        self.view.show_question(&chat_id, index, prompt);
        self.view.begin_answer(&chat_id, index);
        self.view.scroll_to_bottom();

        let request = StreamChatRequest {
            prompt: prompt.to_string(),
            model,
            chat_id: Some(chat_id.clone()),
        };

        let result = tokio::select! {
            result = self.stream_answer(&chat_id, index, &request) => result,
            _ = cancel.cancelled() => Err(ChatError::Cancelled),
        };

        match &result {
            Ok(()) => self.state.store.finish_exchange()?,
            Err(e) => {
                tracing::warn!("Answer for chat {} failed: {}", chat_id, e);
                self.state.store.fail_exchange(&e.to_string())?;
                self.render_answer(&chat_id, index);
            }
        }

        self.view.end_answer(&chat_id, index);
        self.view.scroll_to_bottom();
        result
    }

    async fn stream_answer(
        &mut self,
        chat_id: &str,
        index: usize,
        request: &StreamChatRequest,
    ) -> Result<(), ChatError> {
        let mut payloads = self.client.stream_chat(request).await?;
        while let Some(payload) = payloads.next().await {
            self.state.store.append_to_answer(&payload?)?;
            self.render_answer(chat_id, index);
        }
        Ok(())
    }

    /// Re-render a whole answer from its accumulated text.
    fn render_answer(&mut self, chat_id: &str, index: usize) {
        let Some(exchange) = self
            .state
            .store
            .get(chat_id)
            .and_then(|c| c.messages.get(index))
        else {
            return;
        };
        let html = markdown::render(&exchange.answer);
        self.view.update_answer(chat_id, index, &exchange.answer, &html);
        if self.state.is_raw_visible(chat_id, index) {
            self.view.set_raw_visible(chat_id, index, &exchange.answer, true);
        }
        self.view.scroll_to_bottom();
    }

    fn active_message(&self, index: usize) -> Result<(&Chat, &str), ChatError> {
        let chat = self.state.store.active().ok_or(ChatError::NoActiveChat)?;
        let exchange = chat
            .messages
            .get(index)
            .ok_or(ChatError::UnknownMessage(index))?;
        Ok((chat, exchange.answer.as_str()))
    }

    /// Flip between showing and hiding the raw text of a message in the
    /// active chat. Returns whether it is now visible.
    pub fn toggle_raw(&mut self, index: usize) -> Result<bool, ChatError> {
        let (chat, raw) = match self.active_message(index) {
            Ok((chat, raw)) => (chat.id.clone(), raw.to_string()),
            Err(e) => {
                self.view.alert(&e.to_string());
                return Err(e);
            }
        };

        let key = (chat, index);
        let visible = if self.state.raw_visible.remove(&key) {
            false
        } else {
            self.state.raw_visible.insert(key.clone());
            true
        };
        self.view.set_raw_visible(&key.0, index, &raw, visible);
        Ok(visible)
    }

    /// Copy a fenced code block of a message in the active chat to the
    /// clipboard and tell the user whether it worked.
    pub fn copy_code(&mut self, index: usize, block: usize) -> Result<(), ChatError> {
        let code = match self.active_message(index) {
            Ok((_, answer)) => markdown::code_blocks(answer)
                .into_iter()
                .nth(block)
                .map(|b| b.code)
                .ok_or(ChatError::UnknownCodeBlock(block)),
            Err(e) => Err(e),
        };
        let code = match code {
            Ok(code) => code,
            Err(e) => {
                self.view.alert(&e.to_string());
                return Err(e);
            }
        };

        match self.clipboard.copy(&code) {
            Ok(()) => self.view.alert("Code copied to clipboard!"),
            Err(e) => {
                tracing::warn!("Copy to clipboard failed: {}", e);
                self.view.alert("Failed to copy code.");
            }
        }
        Ok(())
    }
}
