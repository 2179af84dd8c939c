//! Error types for the orchestration engine.

use aegis_core::{CoreError, PlanId, TaskId, TaskStatus};

/// Engine-level errors.
///
/// Step failures are not represented here; they are classifier verdicts
/// handled inside the step loop. These variants cover unknown ids, calls
/// made in the wrong lifecycle position, and collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Task id not present in the store
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Plan id not present in the store
    #[error("plan not found: {0}")]
    PlanNotFound(PlanId),

    /// Operation not valid for the task's current status
    #[error("task {task_id} is {actual}, expected {expected}")]
    InvalidTaskState {
        /// Task in question
        task_id: TaskId,
        /// Status the operation requires
        expected: TaskStatus,
        /// Status actually observed
        actual: TaskStatus,
    },

    /// Task has no current plan attached
    #[error("task {0} has no current plan")]
    NoCurrentPlan(TaskId),

    /// The plan generator failed
    #[error("plan generation failed: {0}")]
    Generation(String),

    /// A core structural invariant was violated
    #[error(transparent)]
    Core(#[from] CoreError),
}
