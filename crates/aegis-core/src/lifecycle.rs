//! Task lifecycle manager: the authoritative state machine.
//!
//! A transition is applied only when the target status is in the allow-list
//! for the current status AND the acting role may enter the target status
//! (`System` always may). A rejected transition leaves the task untouched;
//! an applied one writes the new status and exactly one audit entry as a
//! single unit on the `&mut Task`.

use crate::task::{Task, TaskStatus, TransitionRecord};
use crate::types::Role;
use chrono::Utc;
use serde_json::{Map, Value};

/// Allowed outgoing transitions per status. Terminal statuses have none.
#[must_use]
pub fn allowed_transitions(from: TaskStatus) -> &'static [TaskStatus] {
    use TaskStatus::*;
    match from {
        Draft => &[PendingApproval, Cancelled],
        PendingApproval => &[Approved, Cancelled, Draft],
        Approved => &[InProgress, Cancelled],
        InProgress => &[Completed, Failed, Paused, OnHold, Cancelled],
        Paused => &[InProgress, Cancelled],
        OnHold => &[InProgress, Cancelled],
        Failed => &[Draft, Cancelled],
        Completed | Cancelled => &[],
    }
}

/// Roles permitted to enter a given status, `System` aside.
#[must_use]
pub fn permitted_roles(target: TaskStatus) -> &'static [Role] {
    use TaskStatus::*;
    match target {
        Draft => &[Role::Planner, Role::Human],
        PendingApproval => &[Role::Planner],
        Approved => &[Role::Validator, Role::Human],
        InProgress => &[Role::Executor, Role::Human],
        Paused => &[Role::Executor, Role::Human],
        OnHold => &[Role::Validator, Role::Human],
        Completed => &[Role::Executor],
        Failed => &[Role::Executor],
        Cancelled => &[Role::Human],
    }
}

/// Check a transition without applying it
#[inline]
#[must_use]
pub fn can_transition(from: TaskStatus, to: TaskStatus, role: Role) -> bool {
    allowed_transitions(from).contains(&to)
        && (role == Role::System || permitted_roles(to).contains(&role))
}

/// Apply a status transition.
///
/// Returns `false` and leaves the task untouched when the transition is not
/// allowed from the current status or the role may not enter the target.
/// On success sets the status, appends one audit entry, and records the
/// responsible role for `Approved` (`approved_by_role`) and `InProgress`
/// (`created_by_role`).
pub fn transition(
    task: &mut Task,
    new_status: TaskStatus,
    role: Role,
    reason: Option<&str>,
    metadata: Option<Map<String, Value>>,
) -> bool {
    if !can_transition(task.status, new_status, role) {
        tracing::debug!(
            task_id = %task.id,
            from = %task.status,
            to = %new_status,
            role = %role,
            "transition rejected"
        );
        return false;
    }

    let record = TransitionRecord {
        from: task.status,
        to: new_status,
        role,
        reason: reason.map(str::to_string),
        timestamp: Utc::now(),
        metadata: metadata.unwrap_or_default(),
    };

    task.status = new_status;
    match new_status {
        TaskStatus::Approved => task.approved_by_role = Some(role),
        TaskStatus::InProgress => task.created_by_role = Some(role),
        _ => {}
    }
    task.context.status_history.push(record);

    tracing::info!(
        task_id = %task.id,
        to = %new_status,
        role = %role,
        "task transition applied"
    );
    true
}

/// Transitions the given role (or `System`) may apply from the task's
/// current status. Pure; no side effects.
#[must_use]
pub fn get_allowed_transitions(task: &Task, role: Role) -> Vec<TaskStatus> {
    allowed_transitions(task.status)
        .iter()
        .copied()
        .filter(|to| role == Role::System || permitted_roles(*to).contains(&role))
        .collect()
}

/// Read-only status summary for callers rendering or validating actions
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusInfo {
    /// Current status
    pub status: TaskStatus,
    /// Whether the status has no outgoing transitions
    pub is_terminal: bool,
    /// Transitions available to `System`
    pub allowed_transitions: Vec<TaskStatus>,
    /// Role recorded on approval, if any
    pub approved_by_role: Option<Role>,
    /// Role recorded on execution start, if any
    pub created_by_role: Option<Role>,
    /// Audit trail length
    pub history_len: usize,
}

/// Summarize a task's lifecycle position
#[must_use]
pub fn get_status_info(task: &Task) -> StatusInfo {
    StatusInfo {
        status: task.status,
        is_terminal: task.status.is_terminal(),
        allowed_transitions: allowed_transitions(task.status).to_vec(),
        approved_by_role: task.approved_by_role,
        created_by_role: task.created_by_role,
        history_len: task.context.status_history.len(),
    }
}
