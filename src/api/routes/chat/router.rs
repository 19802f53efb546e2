//! Router for the chat API

use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response, sse::Event, sse::KeepAlive, sse::Sse},
    routing::post,
};
use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public::{self, DONE, FRAMING_HEADER, LINE_FRAMING};
use crate::api::state::{AppState, Turn};
use crate::ollama::RunError;

type SharedState = Arc<RwLock<AppState>>;

fn lock_poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("Shared state lock poisoned")
}

/// Split text into the lines sent as separate events. A trailing line
/// break ends the last line instead of starting an empty one.
fn lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.strip_suffix('\n')
        .unwrap_or(text)
        .split('\n')
        .map(|line| line.replace('\r', ""))
}

/// Send `text` to the client one line per message. Returns false once
/// the client is gone.
fn send_lines(tx: &mpsc::UnboundedSender<String>, text: &str) -> bool {
    lines(text).all(|line| tx.send(line).is_ok())
}

fn event(line: String) -> Result<Event, Infallible> {
    // An empty data field is left out of the event entirely, a lone
    // space still decodes to an empty payload
    let data = if line.is_empty() { " ".to_string() } else { line };
    Ok(Event::default().data(data))
}

fn line_framed<S>(sse: Sse<S>) -> Response
where
    Sse<S>: IntoResponse,
{
    ([(FRAMING_HEADER, LINE_FRAMING)], sse).into_response()
}

/// Respond with a stream holding a single message followed by the
/// done sentinel. Used for request problems the client should see
/// inline rather than as an HTTP failure.
fn message_stream(msg: &str) -> Response {
    let messages: Vec<String> = lines(msg).chain([DONE.to_string()]).collect();
    line_framed(Sse::new(tokio_stream::iter(messages).map(event)))
}

/// Mark the end of a chat's stream, recording the turn when the
/// model finished successfully.
fn finish_turn(state: &SharedState, chat_id: &str, turn: Option<Turn>) {
    let Ok(mut shared_state) = state.write() else {
        tracing::error!("Shared state lock poisoned, dropping turn for {}", chat_id);
        return;
    };
    // The chat may have been reset while streaming
    if let Some(history) = shared_state.sessions.get_mut(chat_id) {
        history.streaming = false;
        if let Some(turn) = turn {
            history.turns.push(turn);
        }
    }
}

/// Run the prompt against the model and stream its output
async fn stream_chat(
    State(state): State<SharedState>,
    Json(payload): Json<public::StreamChatRequest>,
) -> Result<Response, crate::api::public::ApiError> {
    let prompt = payload.prompt.trim().to_string();
    let model = payload.model.trim().to_string();
    let chat_id = payload
        .chat_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    if prompt.is_empty() || model.is_empty() {
        return Ok(message_stream("Missing prompt or model."));
    }

    let (runner, model_available) = {
        let shared_state = state.read().map_err(lock_poisoned)?;
        (
            Arc::clone(&shared_state.runner),
            shared_state.config.is_available(&model),
        )
    };

    if !model_available {
        tracing::warn!("Rejected request for unknown model {}", model);
        return Ok(message_stream(&format!("Invalid model '{}'.", model)));
    }

    let model_prompt = match &chat_id {
        Some(id) => {
            let mut shared_state = state.write().map_err(lock_poisoned)?;
            let history = shared_state.sessions.entry(id.clone()).or_default();
            if history.streaming {
                return Ok((
                    StatusCode::CONFLICT,
                    format!("Chat {} already has a response streaming", id),
                )
                    .into_response());
            }
            history.streaming = true;
            history.prompt_for(&prompt)
        }
        None => prompt.clone(),
    };

    tracing::info!("Streaming {} for chat {:?}", model, chat_id);

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let sse_stream = UnboundedReceiverStream::new(rx).map(event);

    tokio::spawn(async move {
        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        let client = tx.clone();
        let stream_model = model.clone();

        // Forward each line to the client while keeping a copy for the
        // chat history. `line_rx` is owned here so returning early on a
        // disconnect closes the runner's channel and stops the model.
        let forward = async move {
            let mut answer = String::new();
            loop {
                tokio::select! {
                    line = line_rx.recv() => {
                        let Some(line) = line else {
                            return (answer, true);
                        };
                        answer.push_str(&line);
                        if !send_lines(&client, &line) {
                            break;
                        }
                    }
                    _ = client.closed() => break,
                }
            }
            tracing::debug!("Client disconnected from {} stream", stream_model);
            (answer, false)
        };
        let (result, (answer, connected)) =
            tokio::join!(runner.run(&model, &model_prompt, line_tx), forward);

        let turn = match result {
            Ok(()) if connected => Some(Turn {
                prompt: prompt.clone(),
                answer,
            }),
            Ok(()) => None,
            Err(err @ RunError::Exited { .. }) => {
                tracing::error!("Model {} failed: {}", model, err);
                send_lines(&tx, &err.to_string());
                None
            }
            Err(err) => {
                tracing::error!("Stream error: {}", err);
                send_lines(&tx, &format!("Exception in stream_chat: {}", err));
                None
            }
        };
        let _ = tx.send(DONE.to_string());

        if let Some(id) = chat_id {
            finish_turn(&state, &id, turn);
        }
    });

    Ok(line_framed(
        Sse::new(sse_stream).keep_alive(KeepAlive::default().text("keep-alive")),
    ))
}

/// Forget the server-side context of a chat
async fn reset_chat(
    State(state): State<SharedState>,
    Json(payload): Json<public::ResetChatRequest>,
) -> (StatusCode, Json<public::ResetChatResponse>) {
    let Some(chat_id) = payload.chat_id.filter(|id| !id.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(public::ResetChatResponse::error("Missing chat_id.")),
        );
    };

    let Ok(mut shared_state) = state.write() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(public::ResetChatResponse::error("Shared state lock poisoned")),
        );
    };
    if shared_state
        .sessions
        .get(&chat_id)
        .is_some_and(|history| history.streaming)
    {
        return (
            StatusCode::CONFLICT,
            Json(public::ResetChatResponse::error(
                "Cannot reset a chat while a response is streaming.",
            )),
        );
    }
    shared_state.sessions.remove(&chat_id);
    tracing::info!("Reset chat {}", chat_id);

    (StatusCode::OK, Json(public::ResetChatResponse::ok()))
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/stream_chat", post(stream_chat))
        .route("/reset_chat", post(reset_chat))
}
