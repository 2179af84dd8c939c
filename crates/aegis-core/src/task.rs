//! Task entity and its audit trail.
//!
//! A task is the unit of user intent. It is created in `Draft`, mutated only
//! through the lifecycle manager, and never deleted; terminal statuses are
//! `Completed` and `Cancelled`, with `Failed -> Draft` the only escape from
//! failure.

use crate::types::{AgentId, AutonomyLevel, PlanId, Role, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Canonical task status.
///
/// Legacy input aliases (`PENDING`/`PLANNING`, `WAITING_APPROVAL`,
/// `EXECUTING`) are accepted at the deserialization boundary and translated
/// immediately; new code never produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Initial status; plan not yet produced or accepted
    #[serde(alias = "PENDING", alias = "PLANNING")]
    Draft,
    /// Waiting on a human/validator approval action
    #[serde(alias = "WAITING_APPROVAL")]
    PendingApproval,
    /// Plan accepted; execution not yet started
    Approved,
    /// Steps are executing
    #[serde(alias = "EXECUTING")]
    InProgress,
    /// Execution suspended by an operator
    Paused,
    /// Parked pending an asynchronous decision (e.g. re-approval after replan)
    OnHold,
    /// Terminal: all steps completed
    Completed,
    /// Terminal failure short of cancellation; may re-enter Draft
    Failed,
    /// Terminal: abandoned
    Cancelled,
}

impl TaskStatus {
    /// All statuses, in declaration order
    pub const ALL: [TaskStatus; 9] = [
        TaskStatus::Draft,
        TaskStatus::PendingApproval,
        TaskStatus::Approved,
        TaskStatus::InProgress,
        TaskStatus::Paused,
        TaskStatus::OnHold,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Canonical string form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Draft => "DRAFT",
            TaskStatus::PendingApproval => "PENDING_APPROVAL",
            TaskStatus::Approved => "APPROVED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Paused => "PAUSED",
            TaskStatus::OnHold => "ON_HOLD",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    /// Check if no outgoing transitions exist
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = crate::error::CoreError;

    /// Parse a canonical or legacy status string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" | "PENDING" | "PLANNING" => Ok(TaskStatus::Draft),
            "PENDING_APPROVAL" | "WAITING_APPROVAL" => Ok(TaskStatus::PendingApproval),
            "APPROVED" => Ok(TaskStatus::Approved),
            "IN_PROGRESS" | "EXECUTING" => Ok(TaskStatus::InProgress),
            "PAUSED" => Ok(TaskStatus::Paused),
            "ON_HOLD" => Ok(TaskStatus::OnHold),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            "CANCELLED" => Ok(TaskStatus::Cancelled),
            other => Err(crate::error::CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// One immutable audit-trail entry.
///
/// Appended by the lifecycle manager together with the status write it
/// describes; never written on a rejected transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Status before the transition
    pub from: TaskStatus,
    /// Status after the transition
    pub to: TaskStatus,
    /// Role that drove the transition
    pub role: Role,
    /// Optional free-form reason
    pub reason: Option<String>,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
    /// Arbitrary structured context
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Append-only audit log plus free-form workflow-stage data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskContext {
    /// Every applied transition, in order
    #[serde(default)]
    pub status_history: Vec<TransitionRecord>,
    /// Arbitrary workflow-stage payloads keyed by stage name
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// The unit of user intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier
    pub id: TaskId,
    /// Natural-language description
    pub description: String,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Configured autonomy level
    pub autonomy_level: AutonomyLevel,
    /// Scheduling priority (higher runs first); not used by this core
    pub priority: i32,
    /// Role recorded on entering `InProgress`
    pub created_by_role: Option<Role>,
    /// Role recorded on entering `Approved`
    pub approved_by_role: Option<Role>,
    /// Current plan version, if any
    pub plan_id: Option<PlanId>,
    /// Agent assigned to execute the current plan
    pub agent_id: Option<AgentId>,
    /// Audit trail and workflow-stage data
    #[serde(default)]
    pub context: TaskContext,
}

impl Task {
    /// Create a new task in `Draft`
    #[inline]
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            description: description.into(),
            status: TaskStatus::Draft,
            autonomy_level: AutonomyLevel::default(),
            priority: 0,
            created_by_role: None,
            approved_by_role: None,
            plan_id: None,
            agent_id: None,
            context: TaskContext::default(),
        }
    }

    /// With autonomy level
    #[inline]
    #[must_use]
    pub fn with_autonomy(mut self, autonomy: AutonomyLevel) -> Self {
        self.autonomy_level = autonomy;
        self
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// With assigned agent
    #[inline]
    #[must_use]
    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }
}
