use std::io;
use std::path::PathBuf;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::chat::export::write_export;
use crate::chat::terminal::{Osc52Clipboard, TerminalView};
use crate::chat::{ChatClient, ChatController, cancel_pair};

const HELP: &str = "\
Type a message and press enter to send it. End a line with \\ to continue on the next line.
  /models              list the models the server offers
  /model <name>        select a model
  /new                 start a new chat
  /chats               list chats
  /select <n>          switch to chat n
  /reset               clear the current chat
  /raw [n]             show or hide the raw output of message n (default: last)
  /copy <n> [block]    copy a code block of message n to the clipboard
  /export <file>       save the current chat as HTML
  /help                show this help
  /quit                exit
Press Ctrl-C while an answer is streaming to stop it.";

#[derive(Debug, PartialEq)]
enum Input {
    Prompt(String),
    Models,
    Model(String),
    New,
    Chats,
    Select(usize),
    Reset,
    Raw(Option<usize>),
    Copy(usize, usize),
    Export(PathBuf),
    Help,
    Quit,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Prompt(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let number = |i: usize| args.get(i).and_then(|a| a.parse::<usize>().ok());

    match (name, args.len()) {
        ("models", 0) => Input::Models,
        ("model", 1) => Input::Model(args[0].to_string()),
        ("new", 0) => Input::New,
        ("chats", 0) => Input::Chats,
        ("select", 1) => number(0).map_or_else(|| Input::Invalid(trimmed.to_string()), Input::Select),
        ("reset", 0) => Input::Reset,
        ("raw", 0) => Input::Raw(None),
        ("raw", 1) => number(0).map_or_else(|| Input::Invalid(trimmed.to_string()), |n| Input::Raw(Some(n))),
        ("copy", 1 | 2) => match (number(0), args.get(1).map_or(Some(0), |_| number(1))) {
            (Some(message), Some(block)) => Input::Copy(message, block),
            _ => Input::Invalid(trimmed.to_string()),
        },
        ("export", 1) => Input::Export(PathBuf::from(args[0])),
        ("help", 0) => Input::Help,
        ("quit" | "exit", 0) => Input::Quit,
        _ => Input::Invalid(trimmed.to_string()),
    }
}

/// Read one message, joining lines that end in `\`. Returns `None`
/// when the user interrupts or closes the input.
fn read_input(rl: &mut DefaultEditor) -> Result<Option<String>> {
    let mut lines = Vec::new();
    let mut prompt = ">>> ";
    loop {
        match rl.readline(prompt) {
            Ok(line) => match line.strip_suffix('\\') {
                Some(head) => {
                    lines.push(head.to_string());
                    prompt = "... ";
                }
                None => {
                    lines.push(line);
                    return Ok(Some(lines.join("\n")));
                }
            },
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    }
}

pub async fn run(url: &str, model: Option<String>) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let client = ChatClient::new(url);
    let mut controller = ChatController::new(
        client,
        TerminalView::new(io::stdout()),
        Osc52Clipboard::new(io::stdout()),
    );

    let model = match model {
        Some(model) => Some(model),
        None => match controller.client().available_models().await {
            Ok(available) => Some(available.default_model),
            Err(e) => {
                tracing::warn!("Could not fetch models from {}: {}", url, e);
                None
            }
        },
    };
    if let Some(model) = model {
        let _ = controller.select_model(&model);
    }
    controller.new_chat();
    println!("Type /help for commands.");

    let mut rl = DefaultEditor::new()?;
    loop {
        let Some(line) = read_input(&mut rl)? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line.as_str());

        // Errors are already reported through the view
        let result = match parse_input(&line) {
            Input::Prompt(prompt) => {
                let (handle, token) = cancel_pair();
                let ctrl_c = tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        handle.cancel();
                    }
                });
                let result = controller.send_with_cancel(&prompt, token).await;
                ctrl_c.abort();
                result
            }
            Input::Models => {
                match controller.client().available_models().await {
                    Ok(available) => {
                        let selected = controller.state().selected_model.as_deref();
                        for model in available.models {
                            let marker = if Some(model.as_str()) == selected { "*" } else { " " };
                            println!("{} {}", marker, model);
                        }
                    }
                    Err(e) => println!("! {}", e),
                }
                Ok(())
            }
            Input::Model(model) => controller.select_model(&model),
            Input::New => {
                controller.new_chat();
                Ok(())
            }
            Input::Chats => {
                let store = &controller.state().store;
                for (i, chat) in store.chats().iter().enumerate() {
                    let marker = if Some(chat.id.as_str()) == store.active_id() { "*" } else { " " };
                    println!("{} {}. {} ({} messages)", marker, i + 1, chat.name, chat.messages.len());
                }
                Ok(())
            }
            Input::Select(n) => {
                let id = n
                    .checked_sub(1)
                    .and_then(|i| controller.state().store.chats().get(i))
                    .map(|chat| chat.id.clone())
                    .unwrap_or_else(|| n.to_string());
                controller.select_chat(&id)
            }
            Input::Reset => controller.reset_chat().await,
            Input::Raw(n) => {
                let last = controller
                    .state()
                    .store
                    .active()
                    .and_then(|chat| chat.messages.len().checked_sub(1))
                    .unwrap_or(0);
                controller.toggle_raw(n.unwrap_or(last)).map(|_| ())
            }
            Input::Copy(message, block) => controller.copy_code(message, block),
            Input::Export(path) => {
                match controller.state().store.active() {
                    Some(chat) => match write_export(chat, &path) {
                        Ok(()) => println!("* Saved {}", path.display()),
                        Err(e) => println!("! Export failed: {}", e),
                    },
                    None => println!("! No chat is selected."),
                }
                Ok(())
            }
            Input::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Input::Quit => break,
            Input::Invalid(command) => {
                println!("! Unknown command {}. Type /help for commands.", command);
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::debug!("Command failed: {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        assert_eq!(parse_input("Hello there"), Input::Prompt("Hello there".to_string()));
        assert_eq!(
            parse_input("line one\nline two"),
            Input::Prompt("line one\nline two".to_string())
        );
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input("/models"), Input::Models);
        assert_eq!(
            parse_input("/model llama3.2:latest"),
            Input::Model("llama3.2:latest".to_string())
        );
        assert_eq!(parse_input(" /new "), Input::New);
        assert_eq!(parse_input("/select 2"), Input::Select(2));
        assert_eq!(parse_input("/raw"), Input::Raw(None));
        assert_eq!(parse_input("/raw 3"), Input::Raw(Some(3)));
        assert_eq!(parse_input("/copy 1"), Input::Copy(1, 0));
        assert_eq!(parse_input("/copy 1 2"), Input::Copy(1, 2));
        assert_eq!(
            parse_input("/export chat.html"),
            Input::Export(PathBuf::from("chat.html"))
        );
        assert_eq!(parse_input("/exit"), Input::Quit);
    }

    #[test]
    fn test_parse_invalid_commands() {
        assert_eq!(parse_input("/select two"), Input::Invalid("/select two".to_string()));
        assert_eq!(parse_input("/copy x 1"), Input::Invalid("/copy x 1".to_string()));
        assert_eq!(parse_input("/model"), Input::Invalid("/model".to_string()));
        assert_eq!(parse_input("/dance"), Input::Invalid("/dance".to_string()));
    }
}
