use crate::error::GenerationError;
use crate::gallery::GenerationSettings;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Pipeline plan as the provider describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the plan.
    pub step_number: u32,
    /// Expanded prompts, generated in order. The last one feeds the next step.
    pub variations: Vec<String>,
}

impl Step {
    pub fn new(step_number: u32, variations: Vec<String>) -> Self {
        Self {
            step_number,
            variations,
        }
    }

    pub fn variation_count(&self) -> usize {
        self.variations.len()
    }
}

/// A step in execution order, linked to the step whose output it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepNode {
    pub step_number: u32,
    /// `None` for the first step, which consumes the initial reference.
    pub depends_on: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub settings: GenerationSettings,
}

impl Plan {
    pub fn new(steps: Vec<Step>, settings: GenerationSettings) -> Result<Self, GenerationError> {
        let plan = Self { steps, settings };
        plan.validate()?;
        Ok(plan)
    }

    /// Build a plan from the provider's description. A step without variations falls back to its
    /// own prompt as a single variation. Steps are renumbered 1..n in the order given.
    pub fn from_spec(
        spec: &PipelineSpec,
        settings: GenerationSettings,
    ) -> Result<Self, GenerationError> {
        let mut steps = Vec::with_capacity(spec.steps.len());
        for (position, step_spec) in spec.steps.iter().enumerate() {
            let mut variations: Vec<String> = step_spec
                .variations
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            if variations.is_empty() {
                if let Some(prompt) = step_spec
                    .prompt
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                {
                    variations.push(prompt.to_string());
                }
            }
            steps.push(Step::new(position as u32 + 1, variations));
        }
        Self::new(steps, settings)
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.steps.is_empty() {
            return Err(GenerationError::InvalidPlan(
                "Pipeline plan must contain at least one step".to_string(),
            ));
        }
        for (position, step) in self.steps.iter().enumerate() {
            let expected = position as u32 + 1;
            if step.step_number != expected {
                return Err(GenerationError::InvalidPlan(format!(
                    "Step numbers must be contiguous from 1: expected {}, got {}",
                    expected, step.step_number
                )));
            }
            if step.variations.is_empty() {
                return Err(GenerationError::InvalidPlan(format!(
                    "Step {} has no variations",
                    step.step_number
                )));
            }
        }
        Ok(())
    }

    pub fn total_steps(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn total_variations(&self) -> usize {
        self.steps.iter().map(Step::variation_count).sum()
    }

    pub fn step(&self, step_number: u32) -> Option<&Step> {
        step_number
            .checked_sub(1)
            .and_then(|i| self.steps.get(i as usize))
    }

    /// Execution queue: each step depends on its predecessor's propagated output.
    pub fn dependency_queue(&self) -> VecDeque<StepNode> {
        self.steps
            .iter()
            .map(|step| StepNode {
                step_number: step.step_number,
                depends_on: step.step_number.checked_sub(1).filter(|n| *n > 0),
            })
            .collect()
    }
}
