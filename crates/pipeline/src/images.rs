//! Asset upload stage.
//!
//! Decodes each input image from base64 (stripping an optional
//! data-URI prefix) and pushes it to the engine's ingestion endpoint
//! before submission. Sequential and fail-fast: the first bad or
//! unuploadable image aborts the job with the asset named.

use atelier_comfyui::api::ComfyApi;
use atelier_core::job::InputImage;
use base64::Engine;

use crate::error::PipelineError;

/// Strip a data-URI prefix, if any.
///
/// Returns the portion after the first comma when one exists
/// (`data:image/png;base64,AAAA` -> `AAAA`); inputs without a comma
/// are returned unchanged.
pub fn strip_data_uri(data: &str) -> &str {
    match data.split_once(',') {
        Some((_prefix, rest)) => rest,
        None => data,
    }
}

/// Decode and upload every input image, in order.
///
/// A no-op for requests without images. Either all images upload or
/// the stage fails before submission; there is no partial success.
pub async fn upload_input_images(
    api: &ComfyApi,
    images: &[InputImage],
) -> Result<(), PipelineError> {
    for image in images {
        let raw = strip_data_uri(&image.image);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(raw)
            .map_err(|e| PipelineError::DecodeFailure {
                name: image.name.clone(),
                detail: e.to_string(),
            })?;

        tracing::debug!(name = %image.name, bytes = bytes.len(), "Uploading input image");
        api.upload_image(&image.name, bytes)
            .await
            .map_err(|e| PipelineError::UploadFailure {
                name: image.name.clone(),
                detail: e.to_string(),
            })?;
    }
    Ok(())
}
