//! Shared domain types for the ComfyUI job adapter.
//!
//! Holds the job request/result data model exchanged with the host
//! framework and the process-wide configuration loaded from
//! environment variables.

pub mod config;
pub mod job;
