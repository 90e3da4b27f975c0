//! Completion watcher for a submitted workflow.
//!
//! Opens the event stream scoped to the job's session and blocks until
//! a terminal event arrives for the watched prompt. The protocol state
//! lives in [`CompletionWatch`], a plain state machine that tests can
//! drive with synthetic frames; [`wait_for_completion`] is the async
//! driver that feeds it from a real socket.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::client::{ComfyClient, ComfyClientError};
use crate::messages::{parse_message, ComfyMessage};

/// States of one completion watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    /// Establishing the WebSocket handshake.
    Connecting,
    /// Connected; reading frames until a terminal event arrives.
    Waiting,
    /// The watched prompt finished every node (terminal).
    Completed,
    /// The engine reported an execution error for the watched prompt
    /// (terminal).
    Failed(String),
    /// The handshake or the overall deadline expired (terminal).
    TimedOut,
}

/// Fallback when `execution_error` carries no usable message.
const GENERIC_EXECUTION_ERROR: &str = "ComfyUI execution error";

/// State machine tracking one prompt's progress on the event stream.
///
/// Frames are applied one at a time via [`observe_text`]. Malformed
/// frames, unhandled message kinds, and events for other prompts leave
/// the state unchanged -- other jobs may share the stream in principle,
/// and this watch only cares about its own.
///
/// [`observe_text`]: Self::observe_text
#[derive(Debug)]
pub struct CompletionWatch {
    prompt_id: String,
    state: WatchState,
}

impl CompletionWatch {
    /// Start a watch for the given prompt, in [`WatchState::Connecting`].
    pub fn new(prompt_id: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            state: WatchState::Connecting,
        }
    }

    /// Current state.
    pub fn state(&self) -> &WatchState {
        &self.state
    }

    /// Whether the watch has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            WatchState::Completed | WatchState::Failed(_) | WatchState::TimedOut
        )
    }

    /// Connecting -> Waiting: the handshake succeeded.
    pub fn connected(&mut self) {
        if self.state == WatchState::Connecting {
            self.state = WatchState::Waiting;
        }
    }

    /// Connecting -> TimedOut: the handshake exceeded its timeout.
    pub fn connect_timed_out(&mut self) {
        if self.state == WatchState::Connecting {
            self.state = WatchState::TimedOut;
        }
    }

    /// Waiting -> TimedOut: the overall deadline expired. A per-receive
    /// timeout is NOT a deadline -- idle receives retry silently and
    /// never touch the state.
    pub fn deadline_elapsed(&mut self) {
        if self.state == WatchState::Waiting {
            self.state = WatchState::TimedOut;
        }
    }

    /// Apply one text frame while Waiting.
    ///
    /// An `executing` event with a null node for the watched prompt is
    /// the completion signal; an `execution_error` for the watched
    /// prompt is the failure signal. Everything else is ignored.
    pub fn observe_text(&mut self, text: &str) {
        if self.state != WatchState::Waiting {
            return;
        }
        match parse_message(text) {
            Ok(msg) => self.observe(msg),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unparseable event frame");
            }
        }
    }

    fn observe(&mut self, msg: ComfyMessage) {
        match msg {
            ComfyMessage::Executing(data) => {
                if data.prompt_id != self.prompt_id {
                    return;
                }
                match data.node {
                    Some(node) => {
                        tracing::debug!(prompt_id = %self.prompt_id, node = %node, "Executing node");
                    }
                    None => {
                        tracing::info!(prompt_id = %self.prompt_id, "Execution completed");
                        self.state = WatchState::Completed;
                    }
                }
            }
            ComfyMessage::ExecutionError(data) => {
                if data.prompt_id != self.prompt_id {
                    return;
                }
                let message = data
                    .exception_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| GENERIC_EXECUTION_ERROR.to_string());
                tracing::error!(prompt_id = %self.prompt_id, error = %message, "Execution failed");
                self.state = WatchState::Failed(message);
            }
            ComfyMessage::Progress(data) => {
                tracing::debug!(value = data.value, max = data.max, "Generation progress");
            }
            ComfyMessage::Status(data) => {
                tracing::debug!(
                    queue_remaining = data.status.exec_info.queue_remaining,
                    "ComfyUI queue status",
                );
            }
        }
    }
}

/// How a completion watch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The prompt finished successfully.
    Completed,
    /// The engine reported an execution error with this message.
    Failed(String),
    /// The WebSocket handshake exceeded the connect timeout.
    ConnectTimedOut,
    /// The WebSocket handshake failed outright.
    ConnectFailed(String),
    /// The overall deadline expired while waiting (only with a
    /// configured total timeout).
    TimedOut,
    /// The stream ended before a terminal event arrived.
    StreamClosed,
}

/// Connect to the event stream and block until the watched prompt
/// reaches a terminal state.
///
/// A receive that times out after `recv_timeout` with no frame retries
/// silently -- a quiet stream is indistinguishable from a slow node and
/// is tolerated indefinitely unless `total_timeout` is set. The
/// connection is closed on every exit path.
pub async fn wait_for_completion(
    client: &ComfyClient,
    client_id: &str,
    prompt_id: &str,
    recv_timeout: Duration,
    total_timeout: Option<Duration>,
) -> WatchOutcome {
    let mut watch = CompletionWatch::new(prompt_id);

    let mut conn = match client.connect(client_id).await {
        Ok(conn) => conn,
        Err(ComfyClientError::ConnectTimeout(_)) => {
            watch.connect_timed_out();
            return WatchOutcome::ConnectTimedOut;
        }
        Err(e) => return WatchOutcome::ConnectFailed(e.to_string()),
    };
    watch.connected();

    let deadline = total_timeout.map(|t| Instant::now() + t);

    let outcome = loop {
        // The receive window is the per-receive timeout, shortened by
        // an approaching overall deadline when one is configured.
        let window = match deadline {
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    watch.deadline_elapsed();
                    break WatchOutcome::TimedOut;
                }
                recv_timeout.min(d - now)
            }
            None => recv_timeout,
        };

        match tokio::time::timeout(window, conn.ws_stream.next()).await {
            Err(_) => {
                // Idle window with no frame. Retry the receive; the
                // deadline check at the top of the loop decides whether
                // idleness has finally run out the clock.
                tracing::trace!(prompt_id = %prompt_id, "Receive window elapsed, retrying");
            }
            Ok(None) => {
                tracing::warn!(prompt_id = %prompt_id, "Event stream ended before completion");
                break WatchOutcome::StreamClosed;
            }
            Ok(Some(Err(e))) => {
                tracing::error!(prompt_id = %prompt_id, error = %e, "WebSocket receive error");
                break WatchOutcome::StreamClosed;
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                watch.observe_text(&text);
                match watch.state() {
                    WatchState::Completed => break WatchOutcome::Completed,
                    WatchState::Failed(message) => break WatchOutcome::Failed(message.clone()),
                    _ => {}
                }
            }
            Ok(Some(Ok(Message::Binary(_)))) => {
                // Preview images. Not our concern.
                tracing::trace!(prompt_id = %prompt_id, "Ignoring binary frame");
            }
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {
                // Handled automatically by tungstenite.
            }
            Ok(Some(Ok(Message::Close(frame)))) => {
                tracing::warn!(prompt_id = %prompt_id, ?frame, "Server closed the event stream");
                break WatchOutcome::StreamClosed;
            }
            Ok(Some(Ok(Message::Frame(_)))) => {}
        }
    };

    conn.close().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn waiting_watch(prompt_id: &str) -> CompletionWatch {
        let mut watch = CompletionWatch::new(prompt_id);
        watch.connected();
        watch
    }

    #[test]
    fn executing_with_null_node_and_matching_id_completes() {
        let mut watch = waiting_watch("p-1");
        watch.observe_text(r#"{"type":"executing","data":{"node":null,"prompt_id":"p-1"}}"#);
        assert_eq!(*watch.state(), WatchState::Completed);
        assert!(watch.is_terminal());
    }

    #[test]
    fn executing_with_active_node_keeps_waiting() {
        let mut watch = waiting_watch("p-1");
        watch.observe_text(r#"{"type":"executing","data":{"node":"7","prompt_id":"p-1"}}"#);
        assert_eq!(*watch.state(), WatchState::Waiting);
    }

    #[test]
    fn null_node_for_other_prompt_is_ignored() {
        let mut watch = waiting_watch("p-1");
        watch.observe_text(r#"{"type":"executing","data":{"node":null,"prompt_id":"p-2"}}"#);
        assert_eq!(*watch.state(), WatchState::Waiting);
    }

    #[test]
    fn execution_error_with_matching_id_fails_with_engine_message() {
        let mut watch = waiting_watch("p-1");
        watch.observe_text(
            r#"{"type":"execution_error","data":{"prompt_id":"p-1","exception_message":"CUDA out of memory"}}"#,
        );
        assert_matches!(watch.state(), WatchState::Failed(m) => {
            assert_eq!(m, "CUDA out of memory");
        });
    }

    #[test]
    fn execution_error_without_message_uses_the_generic_one() {
        let mut watch = waiting_watch("p-1");
        watch.observe_text(r#"{"type":"execution_error","data":{"prompt_id":"p-1"}}"#);
        assert_matches!(watch.state(), WatchState::Failed(m) => {
            assert_eq!(m, GENERIC_EXECUTION_ERROR);
        });
    }

    #[test]
    fn execution_error_with_empty_message_uses_the_generic_one() {
        let mut watch = waiting_watch("p-1");
        watch.observe_text(
            r#"{"type":"execution_error","data":{"prompt_id":"p-1","exception_message":""}}"#,
        );
        assert_matches!(watch.state(), WatchState::Failed(m) => {
            assert_eq!(m, GENERIC_EXECUTION_ERROR);
        });
    }

    #[test]
    fn execution_error_for_other_prompt_is_ignored() {
        let mut watch = waiting_watch("p-1");
        watch.observe_text(
            r#"{"type":"execution_error","data":{"prompt_id":"p-9","exception_message":"boom"}}"#,
        );
        assert_eq!(*watch.state(), WatchState::Waiting);
    }

    #[test]
    fn unhandled_and_malformed_frames_are_ignored() {
        let mut watch = waiting_watch("p-1");
        watch.observe_text(r#"{"type":"execution_cached","data":{"prompt_id":"p-1"}}"#);
        watch.observe_text("garbage");
        watch.observe_text(r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":0}}}}"#);
        assert_eq!(*watch.state(), WatchState::Waiting);
    }

    #[test]
    fn frames_after_a_terminal_state_do_not_transition() {
        let mut watch = waiting_watch("p-1");
        watch.observe_text(r#"{"type":"executing","data":{"node":null,"prompt_id":"p-1"}}"#);
        watch.observe_text(
            r#"{"type":"execution_error","data":{"prompt_id":"p-1","exception_message":"late"}}"#,
        );
        assert_eq!(*watch.state(), WatchState::Completed);
    }

    #[test]
    fn connect_timeout_transitions_from_connecting() {
        let mut watch = CompletionWatch::new("p-1");
        assert_eq!(*watch.state(), WatchState::Connecting);
        watch.connect_timed_out();
        assert_eq!(*watch.state(), WatchState::TimedOut);
    }

    #[test]
    fn deadline_elapses_only_while_waiting() {
        let mut watch = CompletionWatch::new("p-1");
        watch.deadline_elapsed();
        assert_eq!(*watch.state(), WatchState::Connecting);
        watch.connected();
        watch.deadline_elapsed();
        assert_eq!(*watch.state(), WatchState::TimedOut);
    }

    #[tokio::test]
    async fn unreachable_engine_reports_connect_failure() {
        let client = ComfyClient::new("ws://127.0.0.1:9".into(), Duration::from_secs(5));
        let outcome = wait_for_completion(
            &client,
            "session-1",
            "p-1",
            Duration::from_millis(10),
            None,
        )
        .await;
        assert_matches!(outcome, WatchOutcome::ConnectFailed(_));
    }
}
