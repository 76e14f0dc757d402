//! Generation entry point. One call per user action: single-shot, or a provider-requested
//! pipeline handed to [`crate::pipeline::PipelineExecutor`].

pub mod service;

pub use service::{split_credits, GenerateOutcome, GenerateRequest, GenerationService};
