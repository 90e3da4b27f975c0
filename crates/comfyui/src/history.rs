//! Typed model for the `GET /history/{prompt_id}` response.
//!
//! The history envelope is keyed by prompt id; each entry carries an
//! `outputs` map from node id to that node's produced artifacts.
//! Only the artifact references matter to the adapter -- the node ids
//! and execution metadata are ignored.

use serde::Deserialize;

/// Output artifact lists recorded for one node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ArtifactRef>,
    #[serde(default)]
    pub videos: Vec<ArtifactRef>,
    #[serde(default)]
    pub gifs: Vec<ArtifactRef>,
}

/// Reference to one artifact on the engine's disk, as recorded in the
/// history. Fetchable via `GET /view?filename&subfolder&type`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactRef {
    pub filename: Option<String>,
    #[serde(default)]
    pub subfolder: String,
    /// Engine storage class (`output`, `input`, `temp`).
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ArtifactRef {
    /// Transient artifacts (`type == "temp"`) are previews and other
    /// scratch files; they are never collected.
    pub fn is_transient(&self) -> bool {
        self.kind.as_deref() == Some("temp")
    }

    /// The `type` query parameter value for `GET /view`.
    pub fn kind_param(&self) -> &str {
        self.kind.as_deref().unwrap_or("")
    }
}

/// Extract the per-node outputs recorded for `prompt_id` from the
/// history envelope.
///
/// Nodes whose outputs do not match the expected shape are skipped
/// with a warning; an absent prompt entry yields an empty list.
pub fn extract_outputs(history: &serde_json::Value, prompt_id: &str) -> Vec<NodeOutput> {
    let Some(outputs) = history
        .get(prompt_id)
        .and_then(|entry| entry.get("outputs"))
        .and_then(|outputs| outputs.as_object())
    else {
        return Vec::new();
    };

    outputs
        .iter()
        .filter_map(|(node, value)| {
            match serde_json::from_value::<NodeOutput>(value.clone()) {
                Ok(output) => Some(output),
                Err(e) => {
                    tracing::warn!(node = %node, error = %e, "Skipping malformed node output");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_history() -> serde_json::Value {
        serde_json::json!({
            "p-1": {
                "outputs": {
                    "9": {
                        "images": [
                            {"filename": "final.png", "subfolder": "", "type": "output"},
                            {"filename": "preview.png", "subfolder": "", "type": "temp"},
                        ],
                    },
                    "12": {
                        "gifs": [
                            {"filename": "clip.gif", "subfolder": "anims", "type": "output"},
                        ],
                    },
                },
            },
        })
    }

    #[test]
    fn extracts_outputs_for_matching_prompt() {
        let nodes = extract_outputs(&sample_history(), "p-1");
        assert_eq!(nodes.len(), 2);
        let total_images: usize = nodes.iter().map(|n| n.images.len()).sum();
        let total_gifs: usize = nodes.iter().map(|n| n.gifs.len()).sum();
        assert_eq!(total_images, 2);
        assert_eq!(total_gifs, 1);
    }

    #[test]
    fn unknown_prompt_yields_no_outputs() {
        let nodes = extract_outputs(&sample_history(), "p-2");
        assert!(nodes.is_empty());
    }

    #[test]
    fn temp_artifacts_are_flagged_transient() {
        let nodes = extract_outputs(&sample_history(), "p-1");
        let flags: Vec<bool> = nodes
            .iter()
            .flat_map(|n| n.images.iter())
            .map(ArtifactRef::is_transient)
            .collect();
        assert!(flags.contains(&true));
        assert!(flags.contains(&false));
    }

    #[test]
    fn missing_subfolder_defaults_to_empty() {
        let entry: ArtifactRef =
            serde_json::from_value(serde_json::json!({"filename": "a.png"})).unwrap();
        assert_eq!(entry.subfolder, "");
        assert_eq!(entry.kind_param(), "");
        assert!(!entry.is_transient());
    }

    #[test]
    fn malformed_node_output_is_skipped() {
        let history = serde_json::json!({
            "p-1": {
                "outputs": {
                    "1": {"images": "not-a-list"},
                    "2": {"images": [{"filename": "ok.png", "type": "output"}]},
                },
            },
        });
        let nodes = extract_outputs(&history, "p-1");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].images[0].filename.as_deref(), Some("ok.png"));
    }
}
