//! Output collection stage.
//!
//! After a prompt completes, its recorded history names the artifacts
//! each node produced. This stage filters out transient entries,
//! downloads the survivors, and re-encodes them as base64 into
//! kind-partitioned buckets for the host framework.

use atelier_comfyui::api::ComfyApi;
use atelier_comfyui::history::{extract_outputs, ArtifactRef};
use atelier_core::job::{OutputBuckets, OutputFile};
use base64::Engine;

use crate::error::PipelineError;

/// Fetch and encode every retained artifact of a completed prompt.
///
/// Skips transient (`temp`) entries and entries without a filename.
/// Any history or artifact fetch failure fails the whole stage; no
/// partial artifact lists survive a failed download.
pub async fn collect_outputs(
    api: &ComfyApi,
    prompt_id: &str,
) -> Result<OutputBuckets, PipelineError> {
    let history = api
        .get_history(prompt_id)
        .await
        .map_err(|e| PipelineError::ArtifactFetchFailed(e.to_string()))?;

    let mut buckets = OutputBuckets::default();
    for node in extract_outputs(&history, prompt_id) {
        fetch_into(api, &node.images, &mut buckets.images).await?;
        fetch_into(api, &node.videos, &mut buckets.videos).await?;
        fetch_into(api, &node.gifs, &mut buckets.gifs).await?;
    }

    tracing::info!(
        prompt_id = %prompt_id,
        images = buckets.images.len(),
        videos = buckets.videos.len(),
        gifs = buckets.gifs.len(),
        "Collected job outputs",
    );
    Ok(buckets)
}

/// Download each retained entry and append it to `bucket`.
async fn fetch_into(
    api: &ComfyApi,
    entries: &[ArtifactRef],
    bucket: &mut Vec<OutputFile>,
) -> Result<(), PipelineError> {
    for entry in retained(entries) {
        // retained() guarantees a non-empty filename.
        let filename = entry.filename.clone().unwrap_or_default();
        tracing::debug!(filename = %filename, subfolder = %entry.subfolder, "Fetching artifact");

        let bytes = api
            .fetch_view(&filename, &entry.subfolder, entry.kind_param())
            .await
            .map_err(|e| PipelineError::ArtifactFetchFailed(e.to_string()))?;

        let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
        bucket.push(OutputFile::base64(filename, data));
    }
    Ok(())
}

/// Filter artifact entries down to the collectable ones: not
/// transient, and carrying a non-empty filename.
fn retained(entries: &[ArtifactRef]) -> impl Iterator<Item = &ArtifactRef> {
    entries.iter().filter(|entry| {
        !entry.is_transient() && entry.filename.as_deref().is_some_and(|f| !f.is_empty())
    })
}
