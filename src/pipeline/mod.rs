//! Pipeline generation: plan and executor for running multi-step chains.
//! Each step's last variation seeds the next step; the gallery and provider stay in their domains.

pub mod executor;
pub mod plan;

pub use executor::{ChainState, ChainSummary, PipelineExecutor};
pub use plan::{PipelineSpec, Plan, Step, StepNode, StepSpec};
