//! Plan entity: one concrete, versioned attempt to satisfy a task.
//!
//! Every replan creates version N+1; versions are never mutated once their
//! rationale is recorded. Step status bookkeeping is the only mutable part.

use crate::error::CoreError;
use crate::types::{PlanId, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Step identifier, unique within a plan version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepId(pub u32);

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step_{}", self.0)
    }
}

/// Execution status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Not yet executed (or queued for retry)
    Pending,
    /// Finished successfully
    Completed,
    /// Finished unsuccessfully
    Failed,
}

/// Plan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    /// Produced but not yet accepted
    Draft,
    /// Accepted for execution
    Approved,
    /// Steps are running
    Executing,
    /// All steps completed
    Completed,
    /// Execution failed or the plan was superseded by a replan
    Failed,
    /// Owning task was cancelled
    Cancelled,
}

/// One step of a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step identifier within the plan version
    pub id: StepId,
    /// What the step does
    pub description: String,
    /// Steps that must complete before this one starts
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Current status
    pub status: StepStatus,
    /// Output recorded on completion
    #[serde(default)]
    pub output: Option<Value>,
    /// Retry budget for non-replanning failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Retries consumed so far
    #[serde(default)]
    pub retry_count: u32,
}

fn default_max_retries() -> u32 {
    2
}

impl PlanStep {
    /// Create a pending step
    #[inline]
    #[must_use]
    pub fn new(id: u32, description: impl Into<String>) -> Self {
        Self {
            id: StepId(id),
            description: description.into(),
            depends_on: Vec::new(),
            status: StepStatus::Pending,
            output: None,
            max_retries: default_max_retries(),
            retry_count: 0,
        }
    }

    /// With dependency
    #[inline]
    #[must_use]
    pub fn depends_on(mut self, id: u32) -> Self {
        self.depends_on.push(StepId(id));
        self
    }

    /// With retry budget
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Generator output: the steps and rationale for one plan version.
///
/// The engine owns identity and versioning; generators only produce content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanBlueprint {
    /// Ordered steps
    pub steps: Vec<PlanStep>,
    /// Chosen approach rationale
    pub strategy: String,
    /// Discarded alternative approaches
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// One concrete attempt to satisfy a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Plan identifier
    pub id: PlanId,
    /// Owning task
    pub task_id: TaskId,
    /// Version within the task, starting at 1
    pub version: u32,
    /// Task description snapshot used for risk evaluation
    pub description: String,
    /// Ordered steps
    pub steps: Vec<PlanStep>,
    /// Rationale, immutable once created
    pub strategy: String,
    /// Discarded alternatives, immutable once created
    pub alternatives: Vec<String>,
    /// Plan lifecycle status
    pub status: PlanStatus,
}

impl Plan {
    /// Create version 1 for a task from generator output.
    ///
    /// # Errors
    /// Fails on duplicate step ids or self-dependencies; those are malformed
    /// input, not runtime conditions.
    pub fn new(
        task_id: TaskId,
        description: impl Into<String>,
        blueprint: PlanBlueprint,
    ) -> Result<Self, CoreError> {
        Self::with_version(task_id, description, blueprint, 1)
    }

    /// Create the successor version of this plan from new generator output.
    pub fn next_version(&self, blueprint: PlanBlueprint) -> Result<Self, CoreError> {
        Self::with_version(
            self.task_id,
            self.description.clone(),
            blueprint,
            self.version + 1,
        )
    }

    fn with_version(
        task_id: TaskId,
        description: impl Into<String>,
        blueprint: PlanBlueprint,
        version: u32,
    ) -> Result<Self, CoreError> {
        let plan = Self {
            id: PlanId::new(),
            task_id,
            version,
            description: description.into(),
            steps: blueprint.steps,
            strategy: blueprint.strategy,
            alternatives: blueprint.alternatives,
            status: PlanStatus::Draft,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Validate structural invariants: unique step ids, no self-dependency.
    ///
    /// Dangling dependencies are deliberately not an error here; they
    /// surface as a `Logic` classification at execution time.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id) {
                return Err(CoreError::MalformedPlan(format!(
                    "duplicate step id {}",
                    step.id
                )));
            }
            if step.depends_on.contains(&step.id) {
                return Err(CoreError::MalformedPlan(format!(
                    "{} depends on itself",
                    step.id
                )));
            }
        }
        Ok(())
    }

    /// Dependencies that reference step ids absent from this version
    #[must_use]
    pub fn dangling_dependencies(&self) -> Vec<(StepId, StepId)> {
        let ids: HashSet<StepId> = self.steps.iter().map(|s| s.id).collect();
        self.steps
            .iter()
            .flat_map(|s| {
                s.depends_on
                    .iter()
                    .filter(|d| !ids.contains(d))
                    .map(move |d| (s.id, *d))
            })
            .collect()
    }

    /// Pending steps whose dependencies have all completed
    #[must_use]
    pub fn ready_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| {
                s.status == StepStatus::Pending
                    && s.depends_on.iter().all(|d| {
                        self.steps
                            .iter()
                            .any(|other| other.id == *d && other.status == StepStatus::Completed)
                    })
            })
            .collect()
    }

    /// Check whether every step has completed
    #[inline]
    #[must_use]
    pub fn all_steps_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    /// Mutable access to a step by id
    pub fn step_mut(&mut self, id: StepId) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Outputs of completed steps, for replan context carry-over
    #[must_use]
    pub fn completed_outputs(&self) -> Vec<(StepId, Value)> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .filter_map(|s| s.output.clone().map(|o| (s.id, o)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint(steps: Vec<PlanStep>) -> PlanBlueprint {
        PlanBlueprint {
            steps,
            strategy: "linear".to_string(),
            alternatives: vec![],
        }
    }

    #[test]
    fn plan_versioning_starts_at_one() {
        let plan = Plan::new(TaskId::new(), "t", blueprint(vec![PlanStep::new(1, "a")])).unwrap();
        assert_eq!(plan.version, 1);
        assert_eq!(plan.status, PlanStatus::Draft);

        let next = plan.next_version(blueprint(vec![PlanStep::new(1, "b")])).unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(next.task_id, plan.task_id);
        assert_ne!(next.id, plan.id);
    }

    #[test]
    fn duplicate_step_ids_rejected() {
        let result = Plan::new(
            TaskId::new(),
            "t",
            blueprint(vec![PlanStep::new(1, "a"), PlanStep::new(1, "b")]),
        );
        assert!(matches!(result, Err(CoreError::MalformedPlan(_))));
    }

    #[test]
    fn self_dependency_rejected() {
        let result = Plan::new(
            TaskId::new(),
            "t",
            blueprint(vec![PlanStep::new(1, "a").depends_on(1)]),
        );
        assert!(matches!(result, Err(CoreError::MalformedPlan(_))));
    }

    #[test]
    fn dangling_dependency_reported_not_rejected() {
        let plan = Plan::new(
            TaskId::new(),
            "t",
            blueprint(vec![PlanStep::new(1, "a").depends_on(9)]),
        )
        .unwrap();
        assert_eq!(plan.dangling_dependencies(), vec![(StepId(1), StepId(9))]);
    }

    #[test]
    fn ready_steps_respect_dependencies() {
        let mut plan = Plan::new(
            TaskId::new(),
            "t",
            blueprint(vec![
                PlanStep::new(1, "a"),
                PlanStep::new(2, "b").depends_on(1),
            ]),
        )
        .unwrap();

        let ready: Vec<StepId> = plan.ready_steps().iter().map(|s| s.id).collect();
        assert_eq!(ready, vec![StepId(1)]);

        plan.step_mut(StepId(1)).unwrap().status = StepStatus::Completed;
        let ready: Vec<StepId> = plan.ready_steps().iter().map(|s| s.id).collect();
        assert_eq!(ready, vec![StepId(2)]);
    }
}
