mod events;

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::traits::{GenerationRequest, TextGenerator};
use crate::util::strip_code_blocks;
use events::CliEvent;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// CLI Backend
// =============================================================================

/// Text generation through a local CLI that speaks JSON-lines on stdout.
///
/// The prompt goes in on stdin; events come back as one JSON object per line
/// (`init`, `delta`, `message`, `error`, `done`). The whole invocation runs
/// under a wall-clock timeout after which the subprocess is killed.
/// Temperature and token limits are not forwarded; the CLI owns those.
#[derive(Clone)]
pub struct CliGenerator {
    binary: String,
    model: String,
    timeout: Duration,
    api_key: Option<String>,
    credential_file: Option<PathBuf>,
}

impl CliGenerator {
    pub fn new(binary: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            api_key: None,
            credential_file: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Inject an API key into the child environment as `GEMINI_API_KEY`.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Inject a service-account credential file as `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn with_credential_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential_file = Some(path.into());
        self
    }

    async fn run(&self, prompt: String) -> Result<String> {
        let mut command = tokio::process::Command::new(&self.binary);
        command
            .args(["--output-format", "stream-json", "--model", &self.model])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref key) = self.api_key {
            command.env("GEMINI_API_KEY", key);
        }
        if let Some(ref path) = self.credential_file {
            command.env("GOOGLE_APPLICATION_CREDENTIALS", path);
        }

        debug!(binary = %self.binary, model = %self.model, "Spawning CLI generation");

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow!("{} is not installed or not on PATH", self.binary)
            } else {
                anyhow!("Failed to spawn {}: {}", self.binary, e)
            }
        })?;

        let outcome = tokio::time::timeout(self.timeout, self.collect_output(&mut child, prompt))
            .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                let _ = child.start_kill();
                Err(anyhow!(
                    "{} timed out after {}s",
                    self.binary,
                    self.timeout.as_secs()
                ))
            }
        }
    }

    async fn collect_output(
        &self,
        child: &mut tokio::process::Child,
        prompt: String,
    ) -> Result<String> {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("CLI stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("CLI stdout unavailable"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("CLI stderr unavailable"))?;

        stdin.write_all(prompt.as_bytes()).await?;
        drop(stdin);

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.ok();
            buf
        });

        let (tx, mut rx) = mpsc::channel(events::EVENT_BUFFER);
        let decoder = tokio::spawn(events::read_events(stdout, tx));

        let mut message: Option<String> = None;
        let mut streamed = String::new();
        let mut stream_error: Option<String> = None;

        while let Some(event) = rx.recv().await {
            match event {
                CliEvent::Delta { text } => streamed.push_str(&text),
                CliEvent::Message { content } => message = Some(content),
                CliEvent::Error { message: err } => {
                    stream_error = Some(err);
                    break;
                }
                CliEvent::Done => break,
                CliEvent::Init { .. } | CliEvent::Ignored => {}
            }
        }
        drop(rx);
        let _ = decoder.await;

        let status = child.wait().await?;
        let captured_stderr = stderr_task.await.unwrap_or_default();

        if let Some(err) = stream_error {
            return Err(anyhow!("{} reported an error: {}", self.binary, err));
        }
        if !status.success() {
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.binary,
                status,
                captured_stderr.trim()
            ));
        }

        // A final message event wins over reassembled deltas.
        let text = message.unwrap_or(streamed);
        if text.trim().is_empty() {
            return Err(anyhow!("{} produced no output", self.binary));
        }
        Ok(text)
    }

    fn compose_prompt(request: &GenerationRequest) -> String {
        match &request.system {
            Some(system) => format!("{system}\n\n{}", request.prompt),
            None => request.prompt.clone(),
        }
    }
}

#[async_trait]
impl TextGenerator for CliGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        self.run(Self::compose_prompt(&request)).await
    }

    async fn generate_json(
        &self,
        request: GenerationRequest,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let prompt = format!(
            "{}\n\nRespond with only a JSON value matching this schema, no prose:\n{}",
            Self::compose_prompt(&request),
            schema
        );
        let text = self.run(prompt).await?;

        serde_json::from_str(strip_code_blocks(&text))
            .map_err(|e| anyhow!("{} returned invalid JSON: {}", self.binary, e))
    }

    fn name(&self) -> &str {
        "gemini-cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_prompt_with_system() {
        let request = GenerationRequest::new("body").system("rules first");
        assert_eq!(CliGenerator::compose_prompt(&request), "rules first\n\nbody");
    }

    #[test]
    fn test_compose_prompt_bare() {
        let request = GenerationRequest::new("body");
        assert_eq!(CliGenerator::compose_prompt(&request), "body");
    }

    #[tokio::test]
    async fn test_missing_binary_reports_not_installed() {
        let generator = CliGenerator::new("definitely-not-a-real-binary-kqzx", "m")
            .with_timeout(Duration::from_secs(5));
        let err = generator
            .generate(GenerationRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }
}
