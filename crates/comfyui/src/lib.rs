//! ComfyUI WebSocket and REST client library.
//!
//! Provides the HTTP API wrapper (readiness ping, image upload,
//! workflow submission, history and artifact retrieval), typed
//! WebSocket message parsing, the readiness probe loop, and the
//! completion-watch state machine used to detect when a submitted
//! workflow finishes.

pub mod api;
pub mod client;
pub mod history;
pub mod messages;
pub mod probe;
pub mod watcher;
