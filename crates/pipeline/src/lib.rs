//! The job-execution pipeline.
//!
//! Drives one rendering job through its stages -- validate, probe,
//! upload, submit, watch, collect -- against a ComfyUI instance. Every
//! stage reports failure as a typed [`error::PipelineError`]; the
//! top-level [`run::Pipeline`] maps any failure into the `{"error"}`
//! result shape so the host framework never sees a raw fault.

pub mod collect;
pub mod error;
pub mod images;
pub mod run;
pub mod validate;

pub use error::PipelineError;
pub use run::Pipeline;
