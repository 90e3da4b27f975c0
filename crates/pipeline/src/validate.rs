//! Input validation and normalization.
//!
//! The raw payload may arrive as a structured object or as a
//! serialized-JSON string; either way it must name a workflow, and an
//! optional `images` list must hold `{name, image}` objects. The
//! output is a normalized [`JobRequest`] ready for the pipeline.

use atelier_core::job::{InputImage, JobRequest};

use crate::error::PipelineError;

/// Validate a raw job payload into a [`JobRequest`].
///
/// No side effects; every rejection maps to one [`PipelineError`]
/// variant with its user-visible message.
pub fn validate_input(raw: Option<serde_json::Value>) -> Result<JobRequest, PipelineError> {
    let payload = match raw {
        None | Some(serde_json::Value::Null) => return Err(PipelineError::MissingInput),
        Some(value) => value,
    };

    // A string payload is itself a serialized JSON document.
    let payload = match payload {
        serde_json::Value::String(text) => {
            let parsed: serde_json::Value =
                serde_json::from_str(&text).map_err(|_| PipelineError::InvalidFormat)?;
            if parsed.is_null() {
                return Err(PipelineError::MissingInput);
            }
            parsed
        }
        other => other,
    };

    let workflow = match payload.get("workflow") {
        Some(serde_json::Value::Null) | None => return Err(PipelineError::MissingField),
        Some(workflow) => workflow.clone(),
    };

    let images = match payload.get("images") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(entries)) => {
            let mut images = Vec::with_capacity(entries.len());
            for entry in entries {
                let name = entry.get("name").and_then(|v| v.as_str());
                let image = entry.get("image").and_then(|v| v.as_str());
                match (name, image) {
                    (Some(name), Some(image)) => images.push(InputImage {
                        name: name.to_string(),
                        image: image.to_string(),
                    }),
                    _ => return Err(PipelineError::InvalidImages),
                }
            }
            images
        }
        Some(_) => return Err(PipelineError::InvalidImages),
    };

    let api_key = payload
        .get("comfy_org_api_key")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(JobRequest {
        workflow,
        images,
        api_key,
    })
}
