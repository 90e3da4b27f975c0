//! Worker binary: one job in, one result out.
//!
//! Reads a job payload as JSON from a file argument (or stdin when no
//! argument is given), runs it through the rendering pipeline, and
//! prints the JSON result to stdout. An `{"input": ...}` envelope, as
//! delivered by serverless job dispatchers, is unwrapped if present.

use std::io::Read;

use anyhow::Context;
use atelier_core::config::AdapterConfig;
use atelier_pipeline::Pipeline;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "atelier_worker=debug,atelier_pipeline=debug,atelier_comfyui=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let text = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read job payload from {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read job payload from stdin")?;
            buf
        }
    };

    // A payload that is not valid JSON is handed to the validator as a
    // string, which rejects it with the invalid-format error result.
    let payload: serde_json::Value =
        serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
    let input = unwrap_envelope(payload);

    let config = AdapterConfig::from_env();
    tracing::info!(host = %config.comfy_host, "Worker starting job");

    let pipeline = Pipeline::new(config);
    let result = pipeline.run(input).await;

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

/// Unwrap an `{"input": ...}` dispatcher envelope; a bare payload is
/// the input itself.
fn unwrap_envelope(payload: serde_json::Value) -> Option<serde_json::Value> {
    match payload {
        serde_json::Value::Object(mut fields) if fields.contains_key("input") => {
            fields.remove("input")
        }
        other => Some(other),
    }
}
