use crate::stream::TextStream;
use blueprint_core::{BlueprintError, BlueprintResult};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Outcome of one `data:` payload.
pub(crate) enum SseEvent {
    Text(String),
    Done,
    /// Provider-reported failure mid-stream.
    Error(String),
    Skip,
}

/// Turn a server-sent-events response into a text stream.
///
/// `parse` maps each decoded JSON payload to an [`SseEvent`]; lines that are not
/// `data:` lines, and payloads that fail to parse, are ignored.
pub(crate) fn spawn_text_stream(
    resp: reqwest::Response,
    provider: &'static str,
    parse: fn(&serde_json::Value) -> SseEvent,
) -> TextStream {
    let (tx, rx) = mpsc::channel::<BlueprintResult<String>>(256);
    let mut byte_stream = resp.bytes_stream();

    tokio::spawn(async move {
        let mut buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx
                        .send(Err(BlueprintError::Http(format!(
                            "{provider} stream read error: {e}"
                        ))))
                        .await;
                    return;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer = buffer[line_end + 1..].to_string();

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                    continue;
                };
                if data == "[DONE]" {
                    return;
                }

                let event: serde_json::Value = match serde_json::from_str(data) {
                    Ok(v) => v,
                    Err(_) => continue,
                };

                match parse(&event) {
                    SseEvent::Text(text) => {
                        if tx.send(Ok(text)).await.is_err() {
                            // Consumer dropped the stream.
                            return;
                        }
                    }
                    SseEvent::Done => return,
                    SseEvent::Error(message) => {
                        let _ = tx
                            .send(Err(BlueprintError::Http(format!(
                                "{provider} stream error: {message}"
                            ))))
                            .await;
                        return;
                    }
                    SseEvent::Skip => {}
                }
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Map a non-success response to an HTTP error carrying the status code.
pub(crate) async fn error_for_status(
    resp: reqwest::Response,
    provider: &str,
) -> BlueprintResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(BlueprintError::Http(format!(
        "{provider} API error {}: {body}",
        status.as_u16()
    )))
}

/// Transport failures keep their timeout/connect nature in the message.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> BlueprintError {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection error"
    } else {
        "request error"
    };
    BlueprintError::Http(format!("{provider} {kind}: {e}"))
}
