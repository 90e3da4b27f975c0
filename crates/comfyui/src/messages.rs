//! ComfyUI WebSocket message types and parser.
//!
//! ComfyUI sends JSON text frames shaped `{"type": "<kind>", "data":
//! {...}}`. This module deserializes the kinds the adapter reacts to
//! (or logs) into a typed [`ComfyMessage`] enum.

use serde::Deserialize;

/// WebSocket message kinds the adapter cares about.
///
/// Deserialized via the internally-tagged `"type"` field with
/// associated `"data"` content. Kinds not listed here (previews,
/// cache notices, custom-node chatter) fail to parse; callers ignore
/// those frames and keep waiting.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyMessage {
    /// Server status broadcast (queue depth).
    #[serde(rename = "status")]
    Status(StatusData),

    /// Progress update from a long-running node.
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node is executing -- or the prompt finished, when `node` is null.
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Execution failed with an error.
    #[serde(rename = "execution_error")]
    ExecutionError(ExecutionErrorData),
}

/// Payload for `status` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: QueueStatus,
}

/// Current queue state.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub exec_info: ExecInfo,
}

/// Execution queue statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: i32,
}

/// Payload for `progress` messages (step-level progress within a node).
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    /// Current step number.
    pub value: i32,
    /// Total number of steps.
    pub max: i32,
}

/// Payload for `executing` messages.
///
/// `node == None` with a matching `prompt_id` is the completion
/// signal: every node of that prompt has finished.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    pub prompt_id: String,
}

/// Payload for `execution_error` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionErrorData {
    pub prompt_id: String,
    /// Engine-reported exception text; may be absent or empty.
    #[serde(default)]
    pub exception_message: Option<String>,
}

/// Parse a ComfyUI WebSocket text frame into a typed message.
///
/// Returns `Err` for malformed JSON and for message kinds outside
/// [`ComfyMessage`]. Callers treat both the same way: log and keep
/// reading the stream.
pub fn parse_message(text: &str) -> Result<ComfyMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_executing_with_active_node() {
        let json = r#"{"type":"executing","data":{"node":"17","prompt_id":"p-1"}}"#;
        let msg = parse_message(json).unwrap();
        assert_matches!(msg, ComfyMessage::Executing(data) => {
            assert_eq!(data.node.as_deref(), Some("17"));
            assert_eq!(data.prompt_id, "p-1");
        });
    }

    #[test]
    fn parse_executing_completion_signal() {
        let json = r#"{"type":"executing","data":{"node":null,"prompt_id":"p-1"}}"#;
        let msg = parse_message(json).unwrap();
        assert_matches!(msg, ComfyMessage::Executing(data) => {
            assert!(data.node.is_none());
        });
    }

    #[test]
    fn parse_execution_error_with_message() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"p-1","node_id":"5","exception_message":"CUDA out of memory","exception_type":"RuntimeError"}}"#;
        let msg = parse_message(json).unwrap();
        assert_matches!(msg, ComfyMessage::ExecutionError(data) => {
            assert_eq!(data.prompt_id, "p-1");
            assert_eq!(data.exception_message.as_deref(), Some("CUDA out of memory"));
        });
    }

    #[test]
    fn parse_execution_error_without_message() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"p-1"}}"#;
        let msg = parse_message(json).unwrap();
        assert_matches!(msg, ComfyMessage::ExecutionError(data) => {
            assert!(data.exception_message.is_none());
        });
    }

    #[test]
    fn parse_status_message() {
        let json = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":2}}}}"#;
        let msg = parse_message(json).unwrap();
        assert_matches!(msg, ComfyMessage::Status(data) => {
            assert_eq!(data.status.exec_info.queue_remaining, 2);
        });
    }

    #[test]
    fn parse_progress_message() {
        let json = r#"{"type":"progress","data":{"value":3,"max":25}}"#;
        let msg = parse_message(json).unwrap();
        assert_matches!(msg, ComfyMessage::Progress(data) => {
            assert_eq!(data.value, 3);
            assert_eq!(data.max, 25);
        });
    }

    #[test]
    fn unhandled_kind_is_an_error() {
        let json = r#"{"type":"execution_cached","data":{"prompt_id":"p-1","nodes":[]}}"#;
        assert!(parse_message(json).is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_message("not json at all").is_err());
    }
}
