//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (readiness ping, image upload, workflow
//! submission, history retrieval, artifact download) using [`reqwest`].

use std::time::Duration;

/// Per-request timeout for the readiness ping.
const PING_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-request timeout for uploads, submission, and history fetches.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for artifact downloads (can be large files).
const VIEW_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for a single ComfyUI instance.
pub struct ComfyApi {
    client: reqwest::Client,
    api_url: String,
}

/// A workflow accepted into the execution queue.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// ComfyUI rejected the workflow during validation (HTTP 400 on
    /// `/prompt`). The body carries the engine's rejection detail.
    #[error("Workflow validation failed: {0}")]
    WorkflowRejected(String),

    /// The `/prompt` response was 2xx but carried no usable `prompt_id`.
    #[error("Missing prompt_id in queue response: {body}")]
    MissingPromptId { body: String },
}

impl ComfyApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across stages).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Base HTTP URL this client talks to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Lightweight liveness probe: `GET /` with a short timeout.
    ///
    /// Returns `Ok(())` on any 2xx response. Used by the readiness
    /// probe loop, which absorbs errors and retries.
    pub async fn ping(&self) -> Result<(), ComfyApiError> {
        let response = self
            .client
            .get(format!("{}/", self.api_url))
            .timeout(PING_TIMEOUT)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Upload one decoded image to `POST /upload/image`.
    ///
    /// Sends a multipart form with the image bytes under the given
    /// filename and `overwrite=true`, so re-runs replace stale inputs.
    pub async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<(), ComfyApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("overwrite", "true");

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Submit a workflow for execution via `POST /prompt`.
    ///
    /// The payload pairs the workflow JSON with the session `client_id`
    /// so that completion events on the matching WebSocket can be
    /// correlated. An `api_key`, when supplied, rides along in the
    /// `extra_data` block for comfy.org API nodes.
    ///
    /// HTTP 400 is a validation rejection
    /// ([`ComfyApiError::WorkflowRejected`]); a 2xx response without a
    /// `prompt_id` is [`ComfyApiError::MissingPromptId`]. Neither is
    /// worth retrying.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
        api_key: Option<&str>,
    ) -> Result<SubmittedJob, ComfyApiError> {
        let mut body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });
        if let Some(key) = api_key {
            body["extra_data"] = serde_json::json!({ "api_key_comfy_org": key });
        }

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if response.status().as_u16() == 400 {
            let body = Self::body_text(response).await;
            return Err(ComfyApiError::WorkflowRejected(body));
        }

        let response = Self::ensure_success(response).await?;
        let body: serde_json::Value = response.json().await?;

        let prompt_id = body
            .get("prompt_id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty());

        match prompt_id {
            Some(id) => Ok(SubmittedJob {
                prompt_id: id.to_string(),
            }),
            None => Err(ComfyApiError::MissingPromptId {
                body: body.to_string(),
            }),
        }
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. The returned JSON is
    /// an envelope keyed by prompt id; see
    /// [`history`](crate::history) for the typed traversal.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Download one output artifact's raw bytes via `GET /view`.
    pub async fn fetch_view(
        &self,
        filename: &str,
        subfolder: &str,
        kind: &str,
    ) -> Result<Vec<u8>, ComfyApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", filename),
                ("subfolder", subfolder),
                ("type", kind),
            ])
            .timeout(VIEW_TIMEOUT)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyApiError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = Self::body_text(response).await;
            return Err(ComfyApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ComfyApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Read the response body as text, tolerating unreadable bodies.
    async fn body_text(response: reqwest::Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string())
    }
}
