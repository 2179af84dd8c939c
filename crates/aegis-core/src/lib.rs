//! Aegis core: task/plan orchestration primitives.
//!
//! The pure heart of the orchestration engine:
//! - [`lifecycle`]: the role-gated task status state machine with an
//!   append-only audit trail
//! - [`classifier`]: the execution-error taxonomy that drives automatic
//!   replanning
//! - [`evaluator`] + [`approval`]: agent trust, task risk, and the adaptive
//!   approval gate
//!
//! Everything here is deterministic and free of I/O; the async orchestration
//! loop lives in `aegis-engine`.

pub mod approval;
pub mod classifier;
pub mod error;
pub mod evaluator;
pub mod lifecycle;
pub mod plan;
pub mod task;
pub mod types;

pub use approval::{should_require_approval, ApprovalDecision, ApprovalReason};
pub use classifier::{
    classify, is_critical_error, requires_replanning, ErrorCategory, ExecutionError, Severity,
};
pub use error::CoreError;
pub use evaluator::{calculate_agent_trust_score, calculate_task_risk_level};
pub use lifecycle::{
    get_allowed_transitions, get_status_info, transition, StatusInfo,
};
pub use plan::{Plan, PlanBlueprint, PlanStatus, PlanStep, StepId, StepStatus};
pub use task::{Task, TaskContext, TaskStatus, TransitionRecord};
pub use types::{AgentId, AgentRecord, AutonomyLevel, PlanId, Role, TaskId};
