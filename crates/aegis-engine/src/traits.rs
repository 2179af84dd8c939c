//! Collaborator seams: plan generation and step execution.
//!
//! The engine consumes these narrow contracts and nothing else; how plans
//! are produced (an LLM, a rule engine) and how steps touch the world are
//! out of scope. Step failures are data, not `Err`: the classifier decides
//! what they mean.

use crate::error::EngineError;
use aegis_core::{Plan, PlanBlueprint, PlanStep};
use serde_json::{Map, Value};

/// Produces plan content for a task description.
///
/// Generators return a [`PlanBlueprint`]; identity and version numbering
/// stay with the engine so version N is never mutated by a replan.
#[async_trait::async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Generate the initial plan content for a task
    async fn generate(
        &self,
        description: &str,
        context: &Map<String, Value>,
    ) -> Result<PlanBlueprint, EngineError>;

    /// Generate replacement content after a classified failure.
    ///
    /// `context` carries completed-step outputs and the structured error
    /// (severity, category, failing step) from the orchestration loop.
    async fn replan(
        &self,
        previous: &Plan,
        reason: &str,
        context: &Map<String, Value>,
    ) -> Result<PlanBlueprint, EngineError>;
}

/// Outcome of executing one step
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Step finished; output is recorded on the step
    Completed(Value),
    /// Step failed; the message and type feed the classifier
    Failed {
        /// Raw failure message
        message: String,
        /// Source error type, if known
        error_type: Option<String>,
    },
}

/// Executes individual plan steps
#[async_trait::async_trait]
pub trait StepExecutor: Send + Sync {
    /// Execute one step. Failures are returned as [`StepOutcome::Failed`],
    /// never as panics or transport errors.
    async fn execute(&self, step: &PlanStep, context: &Map<String, Value>) -> StepOutcome;
}
