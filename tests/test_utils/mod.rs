//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::{Router, body::Body};
use tokio::sync::{Notify, mpsc};

use localai::api::AppState;
use localai::api::app;
use localai::chat::StreamDecoder;
use localai::core::AppConfig;
use localai::ollama::{ModelRunner, RunError};

/// Stands in for the `ollama` binary. Every run sends `lines` and
/// then exits with `exit` if set.
#[derive(Default)]
pub struct FakeRunner {
    pub lines: Vec<String>,
    pub exit: Option<(i32, String)>,
    pub unhealthy: bool,
    // When set, each run waits to be notified before finishing
    pub gate: Option<Arc<Notify>>,
    // Prompts received by `run`, in order
    pub prompts: Arc<Mutex<Vec<String>>>,
    // Keep sending `tok` lines until the receiver goes away
    pub endless: bool,
    // Set once a run saw its receiver close
    pub stopped: Arc<AtomicBool>,
}

impl FakeRunner {
    pub fn with_lines(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ModelRunner for FakeRunner {
    async fn version(&self) -> Result<String> {
        if self.unhealthy {
            bail!("No such file or directory (os error 2)");
        }
        Ok("ollama version is 0.5.7".to_string())
    }

    async fn list(&self) -> Result<Vec<String>> {
        if self.unhealthy {
            bail!("No such file or directory (os error 2)");
        }
        Ok(vec![
            "NAME              ID    SIZE    MODIFIED".to_string(),
            "llama3.2:latest   a80c  2.0 GB  2 days ago".to_string(),
        ])
    }

    async fn run(
        &self,
        _model: &str,
        prompt: &str,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<(), RunError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        for line in &self.lines {
            if tx.send(line.clone()).is_err() {
                self.stopped.store(true, Ordering::SeqCst);
                return Ok(());
            }
        }
        while self.endless {
            if tx.send("tok\n".to_string()).is_err() {
                self.stopped.store(true, Ordering::SeqCst);
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = gate.notified() => {}
                _ = tx.closed() => {
                    self.stopped.store(true, Ordering::SeqCst);
                    return Ok(());
                }
            }
        }
        if let Some((code, stderr)) = &self.exit {
            return Err(RunError::Exited {
                code: *code,
                stderr: stderr.clone(),
            });
        }
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        ollama_path: String::from("/nonexistent/ollama"),
        available_models: vec![String::from("m1"), String::from("llama3.2:latest")],
        default_model: String::from("m1"),
        web_ui_path: String::from("./web-ui/src"),
    }
}

/// Creates a test application router backed by `runner`.
pub fn test_app(runner: FakeRunner) -> Router {
    let app_state = AppState::new(test_config(), Arc::new(runner));
    app(Arc::new(RwLock::new(app_state)))
}

/// Creates a test application router and returns the shared state so
/// tests can inspect it.
pub fn test_app_with_state(runner: FakeRunner) -> (Router, Arc<RwLock<AppState>>) {
    let app_state = Arc::new(RwLock::new(AppState::new(test_config(), Arc::new(runner))));
    (app(Arc::clone(&app_state)), app_state)
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Decode a complete SSE body into its payloads.
pub fn payloads(body: &str) -> Vec<String> {
    let mut decoder = StreamDecoder::new();
    let mut out = decoder.push(body.as_bytes());
    out.extend(decoder.finish());
    out
}

/// Wait until no response is streaming for `chat_id`, failing the test
/// after half a minute.
pub async fn wait_until_idle(state: &Arc<RwLock<AppState>>, chat_id: &str) {
    for _ in 0..3000 {
        let streaming = state
            .read()
            .unwrap()
            .sessions
            .get(chat_id)
            .is_some_and(|history| history.streaming);
        if !streaming {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("chat {} is still streaming", chat_id);
}

/// Serve `router` on an ephemeral local port, returning its base url.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
