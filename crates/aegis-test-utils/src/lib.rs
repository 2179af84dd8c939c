//! Testing utilities for the Aegis workspace
//!
//! Shared fixtures and builders for tasks, plans, and agent histories.

#![allow(missing_docs)]

use aegis_core::{
    lifecycle, AgentId, AgentRecord, AutonomyLevel, Plan, PlanBlueprint, PlanStep, Role, Task,
    TaskId, TaskStatus,
};

/// A plan blueprint of `n` independent steps
pub fn flat_blueprint(n: u32) -> PlanBlueprint {
    PlanBlueprint {
        steps: (0..n).map(|i| PlanStep::new(i, format!("step {i}"))).collect(),
        strategy: "execute steps independently".to_string(),
        alternatives: vec![],
    }
}

/// A plan blueprint of `n` steps forming a dependency chain
pub fn chain_blueprint(n: u32) -> PlanBlueprint {
    PlanBlueprint {
        steps: (0..n)
            .map(|i| {
                let step = PlanStep::new(i, format!("step {i}"));
                if i > 0 {
                    step.depends_on(i - 1)
                } else {
                    step
                }
            })
            .collect(),
        strategy: "execute steps in order".to_string(),
        alternatives: vec![],
    }
}

/// A plan built directly from a blueprint
pub fn plan_from(description: &str, blueprint: PlanBlueprint) -> Plan {
    Plan::new(TaskId::new(), description, blueprint).unwrap()
}

/// A task walked to the given status through system transitions
pub fn task_in_status(status: TaskStatus) -> Task {
    let mut task = Task::new("fixture task");
    let path: &[TaskStatus] = match status {
        TaskStatus::Draft => &[],
        TaskStatus::PendingApproval => &[TaskStatus::PendingApproval],
        TaskStatus::Approved => &[TaskStatus::PendingApproval, TaskStatus::Approved],
        TaskStatus::InProgress => &[
            TaskStatus::PendingApproval,
            TaskStatus::Approved,
            TaskStatus::InProgress,
        ],
        TaskStatus::Paused => &[
            TaskStatus::PendingApproval,
            TaskStatus::Approved,
            TaskStatus::InProgress,
            TaskStatus::Paused,
        ],
        TaskStatus::OnHold => &[
            TaskStatus::PendingApproval,
            TaskStatus::Approved,
            TaskStatus::InProgress,
            TaskStatus::OnHold,
        ],
        TaskStatus::Completed => &[
            TaskStatus::PendingApproval,
            TaskStatus::Approved,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ],
        TaskStatus::Failed => &[
            TaskStatus::PendingApproval,
            TaskStatus::Approved,
            TaskStatus::InProgress,
            TaskStatus::Failed,
        ],
        TaskStatus::Cancelled => &[TaskStatus::Cancelled],
    };
    for next in path {
        assert!(lifecycle::transition(&mut task, *next, Role::System, None, None));
    }
    task
}

/// An agent with the given lifetime history
pub fn agent_with_history(total: u64, successful: u64) -> AgentRecord {
    AgentRecord {
        agent_id: AgentId::new(),
        total_tasks_executed: total,
        successful_tasks: successful,
        average_execution_time_ms: 1000.0,
    }
}

/// A fully autonomous task with an assigned agent
pub fn autonomous_task(description: &str, agent_id: AgentId) -> Task {
    Task::new(description)
        .with_autonomy(AutonomyLevel::L4)
        .with_agent(agent_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_reach_requested_status() {
        for status in TaskStatus::ALL {
            assert_eq!(task_in_status(status).status, status);
        }
    }

    #[test]
    fn chain_blueprint_links_steps() {
        let blueprint = chain_blueprint(3);
        assert!(blueprint.steps[0].depends_on.is_empty());
        assert_eq!(blueprint.steps[2].depends_on.len(), 1);
    }
}
