//! Bounded readiness probing for a ComfyUI instance.
//!
//! The engine may still be loading models when a job arrives; the
//! probe loop absorbs that cold-start window by retrying the liveness
//! ping on a short interval until the engine answers or the attempt
//! budget runs out.

use std::time::Duration;

use crate::api::ComfyApi;

/// Ping the engine until it answers with a success status.
///
/// Issues up to `retries` pings, sleeping `interval` between failed
/// attempts. Per-attempt transport errors are absorbed, not
/// propagated. Returns `true` as soon as one attempt succeeds and
/// `false` only after the full budget is exhausted.
pub async fn wait_until_ready(api: &ComfyApi, retries: u32, interval: Duration) -> bool {
    for attempt in 1..=retries {
        match api.ping().await {
            Ok(()) => {
                tracing::info!(attempt, "ComfyUI is ready at {}", api.api_url());
                return true;
            }
            Err(e) => {
                tracing::trace!(attempt, error = %e, "ComfyUI not ready yet");
            }
        }

        if attempt < retries {
            tokio::time::sleep(interval).await;
        }
    }

    tracing::error!(
        retries,
        "ComfyUI at {} never became ready within the probe budget",
        api.api_url(),
    );
    false
}
