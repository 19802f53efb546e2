use std::process::Stdio;
use std::sync::LazyLock;

use anyhow::{Result, bail};
use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::{ModelRunner, RunError};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").expect("Invalid ANSI regex"));

/// Strip terminal escape sequences from a line of model output.
///
/// Carriage returns are dropped too. Returns `None` for lines that
/// held nothing but escape sequences (spinners and cursor movement)
/// so they are not forwarded.
pub fn clean_line(line: &str) -> Option<String> {
    let clean = ANSI_ESCAPE.replace_all(line, "").replace('\r', "");
    if clean.trim().is_empty() && clean.len() != line.len() {
        return None;
    }
    Some(clean)
}

/// Runs models by shelling out to the `ollama` command line.
#[derive(Clone, Debug)]
pub struct OllamaCli {
    path: String,
}

impl OllamaCli {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

#[async_trait]
impl ModelRunner for OllamaCli {
    async fn version(&self) -> Result<String> {
        let output = Command::new(&self.path).arg("--version").output().await?;
        if !output.status.success() {
            bail!(
                "{} --version exited with {}",
                self.path,
                output.status.code().unwrap_or(-1)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let output = Command::new(&self.path).arg("list").output().await?;
        if !output.status.success() {
            bail!(
                "{} list failed: {}",
                self.path,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let models = String::from_utf8_lossy(&output.stdout)
            .trim()
            .lines()
            .map(String::from)
            .collect();
        Ok(models)
    }

    async fn run(
        &self,
        model: &str,
        prompt: &str,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<(), RunError> {
        let mut child = Command::new(&self.path)
            .arg("run")
            .arg(model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("child stdin not captured"))?;
        // The model only starts answering once stdin is closed. Writing
        // on its own task keeps a long transcript from blocking stdout.
        let prompt = prompt.to_string();
        let stdin_task =
            tokio::spawn(async move { stdin.write_all(prompt.as_bytes()).await });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr not captured"))?;

        // Drain stderr on its own task so a full pipe can't stall stdout
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.map(|_| buf)
        });

        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tx.closed() => None,
            };
            let Some(line) = line else {
                break;
            };
            let Some(clean) = clean_line(&line) else {
                continue;
            };
            if tx.send(format!("{clean}\n")).is_err() {
                break;
            }
        }
        if tx.is_closed() {
            tracing::debug!("Receiver for {} closed, stopping the model", model);
            stdin_task.abort();
            return Ok(());
        }

        // A model that exits without reading its prompt closes the pipe
        if let Ok(Err(err)) = stdin_task.await
            && err.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(err.into());
        }
        let status = child.wait().await?;
        let stderr = match stderr_task.await {
            Ok(Ok(buf)) => buf,
            _ => String::new(),
        };

        if !status.success() {
            return Err(RunError::Exited {
                code: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}
