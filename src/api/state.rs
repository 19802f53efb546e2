use std::collections::HashMap;

use crate::core::AppConfig;
use crate::ollama::SharedModelRunner;

/// A completed prompt and the model output it produced.
#[derive(Clone, Debug)]
pub struct Turn {
    pub prompt: String,
    pub answer: String,
}

/// Server-side context for a single `chat_id`.
#[derive(Debug, Default)]
pub struct ChatHistory {
    pub turns: Vec<Turn>,
    // Set while a response for this chat is streaming
    pub streaming: bool,
}

impl ChatHistory {
    /// Build the prompt sent to the model: earlier turns of the chat
    /// as a transcript followed by the new prompt. With no earlier
    /// turns the prompt is passed through unchanged.
    pub fn prompt_for(&self, prompt: &str) -> String {
        if self.turns.is_empty() {
            return prompt.to_string();
        }

        let mut out = String::new();
        for Turn { prompt, answer } in &self.turns {
            out.push_str(&format!("User: {}\nAssistant: {}\n\n", prompt, answer.trim_end()));
        }
        out.push_str(&format!("User: {}\nAssistant:", prompt));
        out
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub runner: SharedModelRunner,
    // Context for each chat keyed by the client's chat_id
    pub sessions: HashMap<String, ChatHistory>,
}

impl AppState {
    pub fn new(config: AppConfig, runner: SharedModelRunner) -> Self {
        Self {
            config,
            runner,
            sessions: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_for_without_history() {
        let history = ChatHistory::default();
        assert_eq!(history.prompt_for("Hello"), "Hello");
    }

    #[test]
    fn test_prompt_for_with_history() {
        let history = ChatHistory {
            turns: vec![Turn {
                prompt: "Hi".to_string(),
                answer: "Hello there\n".to_string(),
            }],
            streaming: false,
        };
        assert_eq!(
            history.prompt_for("How are you?"),
            "User: Hi\nAssistant: Hello there\n\nUser: How are you?\nAssistant:"
        );
    }
}
