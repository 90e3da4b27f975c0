//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`ComfyClient`] holds the connection configuration. Call
//! [`ComfyClient::connect`] with a session id to establish a live
//! [`ComfyConnection`] scoped to that session.

use std::time::Duration;

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Configuration handle for the ComfyUI WebSocket endpoint.
pub struct ComfyClient {
    ws_url: String,
    connect_timeout: Duration,
}

/// A live WebSocket connection to a ComfyUI instance.
///
/// Holds the underlying stream plus the session id it was opened
/// under, so events can be correlated back to the submitted job.
#[derive(Debug)]
pub struct ComfyConnection {
    /// Session id sent as the `clientId` query parameter.
    pub client_id: String,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl ComfyConnection {
    /// Close the connection, ignoring errors on an already-dead socket.
    pub async fn close(mut self) {
        let _ = self.ws_stream.close(None).await;
    }
}

/// Errors that can occur when establishing the WebSocket connection.
#[derive(Debug, thiserror::Error)]
pub enum ComfyClientError {
    /// The handshake did not complete within the connect timeout.
    #[error("Timed out connecting to ComfyUI event stream at {0}")]
    ConnectTimeout(String),

    /// The handshake failed outright (refused, DNS, protocol error).
    #[error("Connection error: {0}")]
    Connection(String),
}

impl ComfyClient {
    /// Create a new client for a ComfyUI WebSocket endpoint.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8188`.
    /// * `connect_timeout` - bound on the handshake.
    pub fn new(ws_url: String, connect_timeout: Duration) -> Self {
        Self {
            ws_url,
            connect_timeout,
        }
    }

    /// WebSocket base URL (e.g. `ws://host:8188`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to `/ws?clientId={client_id}` within the connect timeout.
    ///
    /// ComfyUI addresses execution events to the client id given here,
    /// so the caller must pass the same session id it submitted the
    /// workflow under.
    pub async fn connect(&self, client_id: &str) -> Result<ComfyConnection, ComfyClientError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let connect = tokio::time::timeout(self.connect_timeout, connect_async(&url));
        let (ws_stream, _response) = match connect.await {
            Err(_) => return Err(ComfyClientError::ConnectTimeout(self.ws_url.clone())),
            Ok(Err(e)) => {
                return Err(ComfyClientError::Connection(format!(
                    "Failed to connect to ComfyUI at {}: {e}",
                    self.ws_url
                )))
            }
            Ok(Ok(pair)) => pair,
        };

        tracing::info!(
            client_id = %client_id,
            "Connected to ComfyUI event stream at {}",
            self.ws_url,
        );

        Ok(ComfyConnection {
            client_id: client_id.to_string(),
            ws_stream,
        })
    }
}
