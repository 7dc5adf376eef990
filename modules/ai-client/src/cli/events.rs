use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

/// Bound on buffered events between the decoder task and the consumer.
pub(crate) const EVENT_BUFFER: usize = 64;

/// One JSON-lines event from the CLI's `--output-format stream-json` stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum CliEvent {
    /// Session header emitted before any content.
    Init {
        #[serde(default)]
        model: Option<String>,
    },
    /// Incremental text chunk.
    Delta { text: String },
    /// Complete assembled message; supersedes any deltas.
    Message { content: String },
    /// Fatal error reported in-stream.
    Error { message: String },
    /// End of stream.
    Done,
    /// Unknown event types are tolerated and skipped.
    #[serde(other)]
    Ignored,
}

/// Decode JSON-lines events from `reader` into `tx` until end of stream,
/// a `done` event, or the receiver going away. Undecodable lines are
/// skipped, not fatal: CLI tools interleave diagnostics on stdout.
pub(crate) async fn read_events<R>(reader: R, tx: mpsc::Sender<CliEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<CliEvent>(line) {
            Ok(event) => {
                let done = matches!(event, CliEvent::Done);
                if tx.send(event).await.is_err() {
                    break;
                }
                if done {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Skipping undecodable CLI event line");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &str) -> Vec<CliEvent> {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        read_events(input.as_bytes(), tx).await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_decodes_typed_events() {
        let input = concat!(
            r#"{"type":"init","model":"gemini-2.0-flash"}"#,
            "\n",
            r#"{"type":"delta","text":"Hel"}"#,
            "\n",
            r#"{"type":"delta","text":"lo"}"#,
            "\n",
            r#"{"type":"message","content":"Hello"}"#,
            "\n",
            r#"{"type":"done"}"#,
            "\n",
        );
        let events = collect(input).await;
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[3],
            CliEvent::Message {
                content: "Hello".to_string()
            }
        );
        assert_eq!(events[4], CliEvent::Done);
    }

    #[tokio::test]
    async fn test_skips_garbage_lines() {
        let input = concat!(
            "warming up...\n",
            r#"{"type":"message","content":"ok"}"#,
            "\n",
            "\n",
            r#"{"type":"done"}"#,
            "\n",
        );
        let events = collect(input).await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_event_type_tolerated() {
        let input = concat!(
            r#"{"type":"usage","tokens":40}"#,
            "\n",
            r#"{"type":"done"}"#,
            "\n",
        );
        let events = collect(input).await;
        assert_eq!(events[0], CliEvent::Ignored);
        assert_eq!(events[1], CliEvent::Done);
    }

    #[tokio::test]
    async fn test_stops_after_done() {
        let input = concat!(
            r#"{"type":"done"}"#,
            "\n",
            r#"{"type":"delta","text":"late"}"#,
            "\n",
        );
        let events = collect(input).await;
        assert_eq!(events, vec![CliEvent::Done]);
    }

    #[tokio::test]
    async fn test_error_event_decodes() {
        let input = concat!(r#"{"type":"error","message":"quota exceeded"}"#, "\n");
        let events = collect(input).await;
        assert_eq!(
            events[0],
            CliEvent::Error {
                message: "quota exceeded".to_string()
            }
        );
    }
}
