//! End-to-end pipeline for one rendering job.
//!
//! Stages run strictly in sequence -- validate, probe, upload, submit,
//! watch, collect -- and the first failure short-circuits into a typed
//! [`PipelineError`]. [`Pipeline::run`] is the single result-mapping
//! boundary: whatever happens, the caller gets a well-formed
//! [`JobResult`], never a raw fault.

use atelier_comfyui::api::{ComfyApi, ComfyApiError};
use atelier_comfyui::client::ComfyClient;
use atelier_comfyui::probe::wait_until_ready;
use atelier_comfyui::watcher::{wait_for_completion, WatchOutcome};
use atelier_core::config::AdapterConfig;
use atelier_core::job::{JobResult, OutputBuckets};

use crate::collect::collect_outputs;
use crate::error::PipelineError;
use crate::images::upload_input_images;
use crate::validate::validate_input;

/// One adapter instance: immutable configuration plus the HTTP and
/// WebSocket clients it drives. Safe to use from concurrent job
/// invocations; each job gets its own session and connection.
pub struct Pipeline {
    config: AdapterConfig,
    api: ComfyApi,
    ws: ComfyClient,
}

impl Pipeline {
    /// Build a pipeline from process configuration.
    pub fn new(config: AdapterConfig) -> Self {
        // One pooled reqwest client serves every HTTP stage.
        let api = ComfyApi::with_client(reqwest::Client::new(), config.http_url());
        let ws = ComfyClient::new(config.ws_url(), config.ws_connect_timeout);
        Self { config, api, ws }
    }

    /// Run one job to completion and map the outcome to a result.
    pub async fn run(&self, raw: Option<serde_json::Value>) -> JobResult {
        match self.execute(raw).await {
            Ok(buckets) => JobResult::from_buckets(buckets),
            Err(e) => {
                tracing::error!(error = %e, "Job failed");
                JobResult::error(e.to_string())
            }
        }
    }

    /// The staged pipeline proper.
    async fn execute(&self, raw: Option<serde_json::Value>) -> Result<OutputBuckets, PipelineError> {
        let request = validate_input(raw)?;

        let ready = wait_until_ready(
            &self.api,
            self.config.probe_retries,
            self.config.probe_interval,
        )
        .await;
        if !ready {
            return Err(PipelineError::EngineUnreachable {
                host: self.config.comfy_host.clone(),
            });
        }

        upload_input_images(&self.api, &request.images).await?;

        // Session identity: minted per job, scopes the event stream and
        // correlates submitted work to watched events.
        let session_id = uuid::Uuid::new_v4().to_string();
        let api_key = effective_api_key(
            request.api_key.as_deref(),
            self.config.default_api_key.as_deref(),
        );

        let submitted = self
            .api
            .submit_workflow(&request.workflow, &session_id, api_key)
            .await
            .map_err(map_submit_error)?;
        tracing::info!(prompt_id = %submitted.prompt_id, "Workflow queued");

        let outcome = wait_for_completion(
            &self.ws,
            &session_id,
            &submitted.prompt_id,
            self.config.ws_recv_timeout,
            self.config.ws_total_timeout,
        )
        .await;

        match outcome {
            WatchOutcome::Completed => collect_outputs(&self.api, &submitted.prompt_id).await,
            WatchOutcome::Failed(message) => Err(PipelineError::ExecutionError(message)),
            WatchOutcome::ConnectTimedOut => Err(PipelineError::ConnectTimeout),
            WatchOutcome::ConnectFailed(detail) => Err(PipelineError::Unexpected(detail)),
            WatchOutcome::TimedOut => Err(PipelineError::WaitTimeout),
            WatchOutcome::StreamClosed => Err(PipelineError::StreamClosed),
        }
    }
}

/// Pick the API key to submit with: a non-empty request-supplied key
/// takes precedence, otherwise the non-empty process default. Empty
/// strings count as absent on both sides.
fn effective_api_key<'a>(
    request_key: Option<&'a str>,
    default_key: Option<&'a str>,
) -> Option<&'a str> {
    request_key
        .filter(|k| !k.is_empty())
        .or(default_key.filter(|k| !k.is_empty()))
}

/// Map submission-layer errors into the pipeline taxonomy. A workflow
/// rejection is a caller error; everything else at this stage is a
/// submission failure.
fn map_submit_error(e: ComfyApiError) -> PipelineError {
    match e {
        ComfyApiError::WorkflowRejected(detail) => PipelineError::WorkflowInvalid(detail),
        ComfyApiError::MissingPromptId { body } => PipelineError::MissingJobId { body },
        other => PipelineError::SubmissionFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// A config pointing at a port nothing listens on, with a probe
    /// budget small enough for tests to finish quickly.
    fn unreachable_config() -> AdapterConfig {
        AdapterConfig {
            comfy_host: "127.0.0.1:9".into(),
            probe_retries: 2,
            probe_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn null_input_yields_the_error_result() {
        let pipeline = Pipeline::new(unreachable_config());
        let result = pipeline.run(None).await;
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Please provide input"}));
    }

    #[tokio::test]
    async fn flat_images_string_yields_the_error_result() {
        let pipeline = Pipeline::new(unreachable_config());
        let raw = serde_json::json!({"workflow": {}, "images": "a.png"});
        let result = pipeline.run(Some(raw)).await;
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": "'images' must be a list of objects with 'name' and 'image' keys",
            })
        );
    }

    #[tokio::test]
    async fn unreachable_engine_yields_the_not_reachable_error() {
        let pipeline = Pipeline::new(unreachable_config());
        let raw = serde_json::json!({"workflow": {}});
        let result = pipeline.run(Some(raw)).await;
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": "ComfyUI server (127.0.0.1:9) not reachable."})
        );
    }

    #[test]
    fn request_api_key_overrides_the_default() {
        assert_eq!(
            effective_api_key(Some("sk-request"), Some("sk-default")),
            Some("sk-request")
        );
    }

    #[test]
    fn empty_request_api_key_falls_back_to_the_default() {
        assert_eq!(
            effective_api_key(Some(""), Some("sk-default")),
            Some("sk-default")
        );
        assert_eq!(effective_api_key(None, Some("sk-default")), Some("sk-default"));
    }

    #[test]
    fn empty_keys_on_both_sides_mean_no_key() {
        assert_eq!(effective_api_key(Some(""), Some("")), None);
        assert_eq!(effective_api_key(None, None), None);
    }

    #[test]
    fn workflow_rejection_maps_to_workflow_invalid() {
        let err = map_submit_error(ComfyApiError::WorkflowRejected("bad node 3".into()));
        assert_eq!(
            err.to_string(),
            "Workflow validation failed: bad node 3"
        );
    }

    #[test]
    fn missing_prompt_id_maps_with_the_response_body() {
        let err = map_submit_error(ComfyApiError::MissingPromptId {
            body: r#"{"number":0}"#.into(),
        });
        assert_eq!(
            err.to_string(),
            r#"Missing prompt_id in queue response: {"number":0}"#
        );
    }
}
