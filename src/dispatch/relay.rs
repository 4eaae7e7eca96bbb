//! Bridges a worker event stream onto a committed HTTP response.
//!
//! The relay moves through `Idle → Streaming → {Completed, Failed}`. Headers
//! are committed once when the response is built; after that failures can only
//! show up as body text. The body pulls one event at a time from a capacity-1
//! channel, so the worker cannot get more than one event ahead of the client.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::HeaderValue;
use axum::response::Response;
use futures_util::stream;
use tokio::sync::oneshot;

use crate::command::DownloadConfig;
use crate::pool::{EventStream, StreamEvent};

/// Written when the worker side goes away without `End` or `Error`.
pub const UNTERMINATED_STREAM: &str = "stream closed without a terminal event";

/// `attachment` disposition for `filename`.
///
/// Names outside printable ASCII get an RFC 5987 `filename*` parameter next to
/// an ASCII fallback with the other characters replaced by `_`.
fn content_disposition(filename: &str) -> String {
    let is_plain = filename.chars().all(|c| c.is_ascii() && !c.is_ascii_control());
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if is_plain {
        format!("attachment; filename=\"{}\"", fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(filename)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl RelayState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RelayState::Completed | RelayState::Failed)
    }
}

/// How a relayed stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed,
    Failed(String),
    /// The client stopped reading before a terminal event arrived.
    Disconnected,
}

impl RelayOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RelayOutcome::Completed => "completed",
            RelayOutcome::Failed(_) => "failed",
            RelayOutcome::Disconnected => "disconnected",
        }
    }
}

/// Resolves once the relay reaches a terminal state.
#[derive(Debug)]
pub struct Completion(oneshot::Receiver<RelayOutcome>);

impl Completion {
    pub async fn wait(self) -> RelayOutcome {
        self.0.await.unwrap_or(RelayOutcome::Disconnected)
    }
}

/// One in-flight streaming response.
#[derive(Debug)]
pub struct StreamRelay {
    state: RelayState,
    done: Option<oneshot::Sender<RelayOutcome>>,
}

impl StreamRelay {
    pub fn new() -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                state: RelayState::Idle,
                done: Some(tx),
            },
            Completion(rx),
        )
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Commit headers. Anti-sniff is always set; download mode adds
    /// disposition and content type when configured.
    pub fn start(&mut self, response: &mut Response, download: Option<&DownloadConfig>) {
        if self.state != RelayState::Idle {
            return;
        }

        let headers = response.headers_mut();
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

        if let Some(config) = download {
            if let Some(filename) = &config.filename {
                match HeaderValue::from_str(&content_disposition(filename)) {
                    Ok(value) => {
                        headers.insert(CONTENT_DISPOSITION, value);
                    }
                    Err(_) => tracing::warn!(filename = %filename, "Unusable download filename"),
                }
            }
            if let Some(content_type) = &config.content_type {
                match HeaderValue::from_str(content_type) {
                    Ok(value) => {
                        headers.insert(CONTENT_TYPE, value);
                    }
                    Err(_) => tracing::warn!(content_type = %content_type, "Unusable content type"),
                }
            }
        }

        self.state = RelayState::Streaming;
    }

    /// Apply one event. Returns the bytes to write, if any.
    ///
    /// Events after the terminal one are ignored.
    pub fn on_event(&mut self, event: StreamEvent) -> Option<Bytes> {
        if self.state != RelayState::Streaming {
            return None;
        }

        match event {
            StreamEvent::Data(payload) => Some(payload),
            StreamEvent::End => {
                self.finish(RelayState::Completed, RelayOutcome::Completed);
                None
            }
            StreamEvent::Error(message) => {
                let body = Bytes::from(message.clone());
                self.finish(RelayState::Failed, RelayOutcome::Failed(message));
                Some(body)
            }
        }
    }

    fn finish(&mut self, state: RelayState, outcome: RelayOutcome) {
        self.state = state;
        if let Some(done) = self.done.take() {
            let _ = done.send(outcome);
        }
    }
}

impl Drop for StreamRelay {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(RelayOutcome::Disconnected);
        }
    }
}

/// Build the streaming response for `events`.
///
/// The returned [`Completion`] resolves when a terminal event has been
/// written, or when the client drops the body first.
pub fn into_response(events: EventStream, download: Option<&DownloadConfig>) -> (Response, Completion) {
    let (mut relay, completion) = StreamRelay::new();

    // Headers are committed before the first body poll.
    let mut response = Response::new(Body::empty());
    relay.start(&mut response, download);

    let body = stream::unfold((events, relay), |(mut events, mut relay)| async move {
        loop {
            if relay.state().is_terminal() {
                return None;
            }
            let event = events
                .recv()
                .await
                .unwrap_or_else(|| StreamEvent::Error(UNTERMINATED_STREAM.to_string()));
            if let Some(chunk) = relay.on_event(event) {
                return Some((Ok::<_, Infallible>(chunk), (events, relay)));
            }
        }
    });

    *response.body_mut() = Body::from_stream(body);
    (response, completion)
}
