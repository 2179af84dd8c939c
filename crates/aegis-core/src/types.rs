//! Shared identifier and actor types.
//!
//! Defines the fundamental types used across the core:
//! - Opaque entity identifiers
//! - Roles permitted to drive lifecycle transitions
//! - Per-task autonomy levels
//! - Agent execution history

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate new task ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique plan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId(pub Uuid);

impl PlanId {
    /// Generate new plan ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique agent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Generate new agent ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roles that may drive task lifecycle transitions.
///
/// `System` is permitted to enter every status; the other roles are gated
/// per target status by the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Produces and revises plans
    Planner,
    /// Reviews plans before execution
    Validator,
    /// A human operator
    Human,
    /// Executes plan steps
    Executor,
    /// The orchestration engine itself; always permitted
    System,
}

impl Role {
    /// Stable string form used in audit entries
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Validator => "validator",
            Role::Human => "human",
            Role::Executor => "executor",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-task autonomy level (0-4)
///
/// Bounds how much human confirmation is mandatory regardless of computed
/// risk. Levels 0-2 always require approval; 3 and 4 defer to the
/// risk/trust evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AutonomyLevel {
    /// Level 0: read-only
    L0,
    /// Level 1: step-by-step confirmation
    L1,
    /// Level 2: plan-level confirmation
    L2,
    /// Level 3: autonomous for low-risk plans
    L3,
    /// Level 4: fully autonomous within risk bounds
    L4,
}

impl AutonomyLevel {
    /// Get numeric value
    #[inline]
    #[must_use]
    pub fn value(&self) -> u8 {
        match self {
            AutonomyLevel::L0 => 0,
            AutonomyLevel::L1 => 1,
            AutonomyLevel::L2 => 2,
            AutonomyLevel::L3 => 3,
            AutonomyLevel::L4 => 4,
        }
    }

    /// Check if this level mandates approval before any unattended work
    #[inline]
    #[must_use]
    pub fn requires_blanket_approval(&self) -> bool {
        self.value() <= 2
    }
}

impl Default for AutonomyLevel {
    fn default() -> Self {
        AutonomyLevel::L2
    }
}

impl TryFrom<u8> for AutonomyLevel {
    type Error = crate::error::CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AutonomyLevel::L0),
            1 => Ok(AutonomyLevel::L1),
            2 => Ok(AutonomyLevel::L2),
            3 => Ok(AutonomyLevel::L3),
            4 => Ok(AutonomyLevel::L4),
            other => Err(crate::error::CoreError::InvalidAutonomyLevel(other)),
        }
    }
}

/// Lifetime execution record for an agent
///
/// Feeds the trust score: the ratio of successful to total executions,
/// shrunk toward a cold-start prior when the sample is small.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Agent identifier
    pub agent_id: AgentId,
    /// Total tasks this agent has executed
    pub total_tasks_executed: u64,
    /// Tasks that completed successfully
    pub successful_tasks: u64,
    /// Running mean of execution time in milliseconds
    pub average_execution_time_ms: f64,
}

impl AgentRecord {
    /// Create a fresh record with no history
    #[inline]
    #[must_use]
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            total_tasks_executed: 0,
            successful_tasks: 0,
            average_execution_time_ms: 0.0,
        }
    }

    /// Record one completed execution.
    ///
    /// Maintains a true running mean of execution time.
    pub fn record_execution(&mut self, success: bool, elapsed_ms: u64) {
        let prior_total = self.total_tasks_executed as f64;
        self.total_tasks_executed += 1;
        if success {
            self.successful_tasks += 1;
        }
        self.average_execution_time_ms = (self.average_execution_time_ms * prior_total
            + elapsed_ms as f64)
            / self.total_tasks_executed as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_generation_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
        assert_ne!(PlanId::new(), PlanId::new());
        assert_ne!(AgentId::new(), AgentId::new());
    }

    #[test]
    fn autonomy_level_value_roundtrip() {
        for n in 0..=4u8 {
            let level = AutonomyLevel::try_from(n).unwrap();
            assert_eq!(level.value(), n);
        }
        assert!(AutonomyLevel::try_from(5).is_err());
    }

    #[test]
    fn autonomy_blanket_approval() {
        assert!(AutonomyLevel::L0.requires_blanket_approval());
        assert!(AutonomyLevel::L2.requires_blanket_approval());
        assert!(!AutonomyLevel::L3.requires_blanket_approval());
        assert!(!AutonomyLevel::L4.requires_blanket_approval());
    }

    #[test]
    fn agent_record_running_mean() {
        let mut record = AgentRecord::new(AgentId::new());
        record.record_execution(true, 100);
        record.record_execution(true, 200);
        record.record_execution(false, 300);

        assert_eq!(record.total_tasks_executed, 3);
        assert_eq!(record.successful_tasks, 2);
        assert!((record.average_execution_time_ms - 200.0).abs() < f64::EPSILON);
    }
}
