//! Pipeline failure taxonomy.
//!
//! One variant per way a job can fail. Display strings are the
//! user-visible messages placed verbatim into the `{"error": ...}`
//! result, so they name the offending input where one exists.

/// Everything that can go wrong between receiving a job payload and
/// returning its artifacts.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The payload was absent or JSON null.
    #[error("Please provide input")]
    MissingInput,

    /// The payload was a string that failed to parse as JSON.
    #[error("Invalid JSON format in input")]
    InvalidFormat,

    /// The payload carried no `workflow` field.
    #[error("Missing 'workflow' parameter")]
    MissingField,

    /// The `images` field was not a list of `{name, image}` objects.
    #[error("'images' must be a list of objects with 'name' and 'image' keys")]
    InvalidImages,

    /// The engine never answered the readiness probe.
    #[error("ComfyUI server ({host}) not reachable.")]
    EngineUnreachable { host: String },

    /// An input image's payload was not valid base64.
    #[error("Failed to decode base64 for {name}: {detail}")]
    DecodeFailure { name: String, detail: String },

    /// An input image failed to upload.
    #[error("Failed to upload {name}: {detail}")]
    UploadFailure { name: String, detail: String },

    /// The engine rejected the workflow during validation (HTTP 400),
    /// with its rejection detail verbatim.
    #[error("Workflow validation failed: {0}")]
    WorkflowInvalid(String),

    /// Submission failed for any non-validation reason.
    #[error("Workflow submission failed: {0}")]
    SubmissionFailed(String),

    /// The queue response carried no prompt id.
    #[error("Missing prompt_id in queue response: {body}")]
    MissingJobId { body: String },

    /// The event-stream handshake exceeded its timeout.
    #[error("Timed out connecting to ComfyUI event stream")]
    ConnectTimeout,

    /// The optional overall deadline expired while waiting for the job
    /// to finish.
    #[error("Timed out waiting for workflow completion")]
    WaitTimeout,

    /// The event stream ended before a terminal event arrived.
    #[error("ComfyUI event stream closed before completion")]
    StreamClosed,

    /// The engine reported an execution error; the message is the
    /// engine's, passed through verbatim.
    #[error("{0}")]
    ExecutionError(String),

    /// Fetching the history or an artifact's bytes failed.
    #[error("Failed to fetch job outputs: {0}")]
    ArtifactFetchFailed(String),

    /// Anything the other variants do not cover.
    #[error("{0}")]
    Unexpected(String),
}
