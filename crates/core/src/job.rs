//! Job request/result data model.
//!
//! A job arrives as a single JSON document naming a ComfyUI workflow
//! plus optional input images, and leaves as either an error object or
//! a set of base64-encoded output artifacts partitioned by kind.

use serde::{Deserialize, Serialize};

/// A validated, normalized job request.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// The workflow graph, passed to ComfyUI verbatim.
    pub workflow: serde_json::Value,
    /// Input images to upload before submission (possibly empty).
    pub images: Vec<InputImage>,
    /// Per-request API key, overriding the process-wide default.
    pub api_key: Option<String>,
}

/// One auxiliary input image.
#[derive(Debug, Clone, Deserialize)]
pub struct InputImage {
    /// Filename the engine will store the image under.
    pub name: String,
    /// Base64 payload, optionally with a data-URI prefix.
    pub image: String,
}

/// One collected output artifact, re-encoded for transport.
#[derive(Debug, Clone, Serialize)]
pub struct OutputFile {
    pub filename: String,
    /// Always `"base64"`; names the encoding of `data`.
    #[serde(rename = "type")]
    pub encoding: &'static str,
    pub data: String,
}

impl OutputFile {
    /// Wrap already-encoded base64 data under the given filename.
    pub fn base64(filename: String, data: String) -> Self {
        Self {
            filename,
            encoding: "base64",
            data,
        }
    }
}

/// Output artifacts partitioned by kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputBuckets {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<OutputFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<OutputFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gifs: Vec<OutputFile>,
}

impl OutputBuckets {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty() && self.gifs.is_empty()
    }
}

/// The result returned to the host framework.
///
/// Serializes to exactly one of three JSON shapes:
/// `{"error": "..."}`, the artifact buckets (empty buckets omitted),
/// or the distinguished no-outputs form
/// `{"status": "success_no_outputs", "images": [], "videos": [], "gifs": []}`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JobResult {
    Error {
        error: String,
    },
    NoOutputs {
        status: &'static str,
        images: [OutputFile; 0],
        videos: [OutputFile; 0],
        gifs: [OutputFile; 0],
    },
    Outputs(OutputBuckets),
}

impl JobResult {
    /// Wrap an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Wrap collected buckets, substituting the no-outputs form when
    /// every bucket is empty.
    pub fn from_buckets(buckets: OutputBuckets) -> Self {
        if buckets.is_empty() {
            Self::NoOutputs {
                status: "success_no_outputs",
                images: [],
                videos: [],
                gifs: [],
            }
        } else {
            Self::Outputs(buckets)
        }
    }
}
