//! The orchestration loop.
//!
//! Advances a plan step by step, classifies failures, retries or replans,
//! and routes risky replacement plans back through the approval gate. The
//! per-task mutex in [`TaskStore`] serializes every status write and every
//! piece of step bookkeeping; it is never held across plan generation or
//! step execution.

use crate::error::EngineError;
use crate::store::{AgentRegistry, PlanStore, TaskStore};
use crate::traits::{PlanGenerator, StepExecutor, StepOutcome};
use aegis_core::{
    classify, lifecycle, should_require_approval, ApprovalDecision, ExecutionError, Plan,
    PlanStatus, Role, StatusInfo, StepId, StepStatus, Task, TaskId, TaskStatus,
};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Instant;

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Replan attempts allowed per task before degrading to `Failed`
    pub max_replans: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_replans: 3 }
    }
}

/// What the step loop decided to do after applying a round of outcomes
enum RoundVerdict {
    /// Keep executing the current plan
    Continue,
    /// Retry budget exhausted on a non-replanning failure
    FailTask(ExecutionError),
    /// A High/Critical failure: discard this plan version
    Replan(ExecutionError, StepId),
}

/// The orchestration engine: owns the stores and drives tasks through the
/// lifecycle using the injected generator and executor.
pub struct OrchestrationEngine<G, E> {
    tasks: TaskStore,
    plans: PlanStore,
    agents: AgentRegistry,
    generator: Arc<G>,
    executor: Arc<E>,
    config: EngineConfig,
}

impl<G: PlanGenerator, E: StepExecutor> OrchestrationEngine<G, E> {
    /// Create an engine with fresh, empty stores
    #[must_use]
    pub fn new(generator: G, executor: E, config: EngineConfig) -> Self {
        Self {
            tasks: TaskStore::new(),
            plans: PlanStore::new(),
            agents: AgentRegistry::new(),
            generator: Arc::new(generator),
            executor: Arc::new(executor),
            config,
        }
    }

    /// Task store handle
    #[inline]
    #[must_use]
    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    /// Agent registry handle
    #[inline]
    #[must_use]
    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Admit a task into the store (status `Draft`)
    pub fn submit(&self, task: Task) -> TaskId {
        if let Some(agent_id) = task.agent_id {
            self.agents.register(agent_id);
        }
        tracing::info!(task_id = %task.id, "task submitted");
        self.tasks.insert(task)
    }

    /// Generate the initial plan for a `Draft` task and run the approval
    /// gate over it.
    ///
    /// On return the task is `PendingApproval` (a human must sign off) or
    /// `Approved` (the gate let it through). The gate decision is recorded
    /// in the task's workflow data either way.
    pub async fn plan_task(
        &self,
        task_id: TaskId,
        override_risk: bool,
    ) -> Result<ApprovalDecision, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;

        let (description, autonomy, agent_id, gen_context) = {
            let task = cell.lock().await;
            if task.status != TaskStatus::Draft {
                return Err(EngineError::InvalidTaskState {
                    task_id,
                    expected: TaskStatus::Draft,
                    actual: task.status,
                });
            }
            (
                task.description.clone(),
                task.autonomy_level,
                task.agent_id,
                task.context.data.clone(),
            )
        };

        // Generation is slow and external; the task lock is not held here.
        let blueprint = self.generator.generate(&description, &gen_context).await?;
        let mut plan = Plan::new(task_id, &description, blueprint)?;

        let agent_record = agent_id.and_then(|a| self.agents.get(a));
        let decision = should_require_approval(
            &plan,
            agent_record.as_ref(),
            None,
            Some(autonomy),
            override_risk,
        );
        if !decision.requires_approval {
            plan.status = PlanStatus::Approved;
        }
        let plan_version = plan.version;

        let mut task = cell.lock().await;
        // Re-evaluate after the await: another actor may have moved the task.
        // The generated plan is only stored once the task is confirmed still
        // Draft, so a lost race leaves nothing behind.
        if task.status != TaskStatus::Draft {
            return Err(EngineError::InvalidTaskState {
                task_id,
                expected: TaskStatus::Draft,
                actual: task.status,
            });
        }
        let plan_id = self.plans.insert(plan);

        let mut metadata = Map::new();
        metadata.insert("plan_id".to_string(), json!(plan_id.to_string()));
        metadata.insert("plan_version".to_string(), json!(plan_version));
        lifecycle::transition(
            &mut task,
            TaskStatus::PendingApproval,
            Role::Planner,
            Some("plan generated"),
            Some(metadata),
        );
        task.plan_id = Some(plan_id);
        task.context
            .data
            .insert("approval".to_string(), json!(&decision));

        if !decision.requires_approval {
            lifecycle::transition(
                &mut task,
                TaskStatus::Approved,
                Role::System,
                Some(decision.reason.as_str()),
                None,
            );
        }

        Ok(decision)
    }

    /// Apply an asynchronous approval action
    pub async fn approve(&self, task_id: TaskId, role: Role) -> Result<bool, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;
        let mut task = cell.lock().await;
        let applied = lifecycle::transition(&mut task, TaskStatus::Approved, role, None, None);
        if applied {
            if let Some(plan_id) = task.plan_id {
                if let Some(plan_cell) = self.plans.get(plan_id) {
                    plan_cell.lock().await.status = PlanStatus::Approved;
                }
            }
        }
        Ok(applied)
    }

    /// Send a pending plan back to the drawing board
    pub async fn send_back(&self, task_id: TaskId, role: Role) -> Result<bool, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;
        let mut task = cell.lock().await;
        Ok(lifecycle::transition(
            &mut task,
            TaskStatus::Draft,
            role,
            Some("plan rejected"),
            None,
        ))
    }

    /// Cancel from any non-terminal status the graph permits.
    ///
    /// In-flight execution observes the new status at its next checkpoint.
    pub async fn cancel(&self, task_id: TaskId, role: Role) -> Result<bool, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;
        let mut task = cell.lock().await;
        let applied = lifecycle::transition(&mut task, TaskStatus::Cancelled, role, None, None);
        if applied {
            if let Some(plan_id) = task.plan_id {
                if let Some(plan_cell) = self.plans.get(plan_id) {
                    plan_cell.lock().await.status = PlanStatus::Cancelled;
                }
            }
        }
        Ok(applied)
    }

    /// Suspend an in-progress task
    pub async fn pause(&self, task_id: TaskId, role: Role) -> Result<bool, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;
        let mut task = cell.lock().await;
        Ok(lifecycle::transition(&mut task, TaskStatus::Paused, role, None, None))
    }

    /// Unpark a `Paused` or `OnHold` task.
    ///
    /// For a task parked `OnHold` by a replan, resuming is the approval of
    /// the replacement plan.
    pub async fn resume(&self, task_id: TaskId, role: Role) -> Result<bool, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;
        let mut task = cell.lock().await;
        let applied =
            lifecycle::transition(&mut task, TaskStatus::InProgress, role, Some("resumed"), None);
        if applied {
            if let Some(plan_id) = task.plan_id {
                if let Some(plan_cell) = self.plans.get(plan_id) {
                    let mut plan = plan_cell.lock().await;
                    if matches!(plan.status, PlanStatus::Draft | PlanStatus::Approved) {
                        plan.status = PlanStatus::Executing;
                    }
                }
            }
        }
        Ok(applied)
    }

    /// Lifecycle summary for a task
    pub async fn get_status(&self, task_id: TaskId) -> Result<StatusInfo, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;
        let task = cell.lock().await;
        Ok(lifecycle::get_status_info(&task))
    }

    /// Point-in-time clone of a task
    pub async fn snapshot(&self, task_id: TaskId) -> Result<Task, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;
        let task = cell.lock().await.clone();
        Ok(task)
    }

    /// Point-in-time clone of a task's current plan
    pub async fn current_plan(&self, task_id: TaskId) -> Result<Plan, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;
        let plan_id = cell
            .lock()
            .await
            .plan_id
            .ok_or(EngineError::NoCurrentPlan(task_id))?;
        let plan_cell = self.plans.get(plan_id).ok_or(EngineError::PlanNotFound(plan_id))?;
        let plan = plan_cell.lock().await.clone();
        Ok(plan)
    }

    /// Execute the task's current plan to completion, parking, or failure.
    ///
    /// Valid from `Approved` (fresh start) or `InProgress` (resumption).
    /// Returns the status the task ended this run in: `Completed`,
    /// `Failed`, `Cancelled`, or a parked status (`Paused`/`OnHold`).
    pub async fn execute_task(&self, task_id: TaskId) -> Result<TaskStatus, EngineError> {
        let cell = self.tasks.get(task_id).ok_or(EngineError::TaskNotFound(task_id))?;
        let started = Instant::now();

        let (agent_id, autonomy) = {
            let mut task = cell.lock().await;
            match task.status {
                TaskStatus::Approved => {
                    lifecycle::transition(
                        &mut task,
                        TaskStatus::InProgress,
                        Role::Executor,
                        Some("execution started"),
                        None,
                    );
                }
                TaskStatus::InProgress => {}
                actual => {
                    return Err(EngineError::InvalidTaskState {
                        task_id,
                        expected: TaskStatus::Approved,
                        actual,
                    })
                }
            }
            let plan_id = task.plan_id.ok_or(EngineError::NoCurrentPlan(task_id))?;
            let plan_cell = self.plans.get(plan_id).ok_or(EngineError::PlanNotFound(plan_id))?;
            plan_cell.lock().await.status = PlanStatus::Executing;
            (task.agent_id, task.autonomy_level)
        };

        let mut replans_used = 0u32;
        loop {
            // Checkpoint: observe any status applied while the lock was free.
            let plan_cell = {
                let task = cell.lock().await;
                match task.status {
                    TaskStatus::InProgress => {}
                    TaskStatus::Cancelled => {
                        if let Some(plan_id) = task.plan_id {
                            if let Some(pc) = self.plans.get(plan_id) {
                                pc.lock().await.status = PlanStatus::Cancelled;
                            }
                        }
                        return Ok(TaskStatus::Cancelled);
                    }
                    parked => return Ok(parked),
                }
                let plan_id = task.plan_id.ok_or(EngineError::NoCurrentPlan(task_id))?;
                self.plans.get(plan_id).ok_or(EngineError::PlanNotFound(plan_id))?
            };

            // Select runnable steps under the plan cell.
            let ready: Vec<_> = {
                let plan = plan_cell.lock().await;

                if let Some((step, missing)) = plan.dangling_dependencies().first().copied() {
                    let message = format!(
                        "invalid plan structure: {step} depends on missing {missing}"
                    );
                    let verdict = classify(&message, None, None);
                    drop(plan);
                    match self
                        .start_replan(&cell, &plan_cell, verdict, step, &mut replans_used, agent_id, autonomy, started)
                        .await?
                    {
                        Some(parked) => return Ok(parked),
                        None => continue,
                    }
                }

                if plan.steps.is_empty() {
                    let verdict = classify("plan has no steps", None, None);
                    drop(plan);
                    match self
                        .start_replan(&cell, &plan_cell, verdict, StepId(0), &mut replans_used, agent_id, autonomy, started)
                        .await?
                    {
                        Some(parked) => return Ok(parked),
                        None => continue,
                    }
                }

                if plan.all_steps_completed() {
                    drop(plan);
                    plan_cell.lock().await.status = PlanStatus::Completed;
                    let mut task = cell.lock().await;
                    lifecycle::transition(
                        &mut task,
                        TaskStatus::Completed,
                        Role::Executor,
                        Some("all steps completed"),
                        None,
                    );
                    if let Some(agent) = agent_id {
                        self.agents.record_execution(
                            agent,
                            true,
                            started.elapsed().as_millis() as u64,
                        );
                    }
                    tracing::info!(task_id = %task_id, "task completed");
                    return Ok(TaskStatus::Completed);
                }

                let ready: Vec<_> = plan.ready_steps().into_iter().cloned().collect();
                if ready.is_empty() {
                    // Pending steps remain but none can run: the ordering is
                    // unsatisfiable (failed prerequisite or a cycle).
                    let message =
                        "circular dependency or unsatisfiable step ordering in plan".to_string();
                    let verdict = classify(&message, None, None);
                    let stuck = plan
                        .steps
                        .iter()
                        .find(|s| s.status == StepStatus::Pending)
                        .map(|s| s.id)
                        .unwrap_or(StepId(0));
                    drop(plan);
                    match self
                        .start_replan(&cell, &plan_cell, verdict, stuck, &mut replans_used, agent_id, autonomy, started)
                        .await?
                    {
                        Some(parked) => return Ok(parked),
                        None => continue,
                    }
                }
                ready
            };

            // Dependency-free steps run concurrently; no task or plan lock
            // is held while they do.
            let executions = ready.iter().map(|step| {
                let mut context = Map::new();
                context.insert("task_id".to_string(), json!(task_id.to_string()));
                context.insert("step_id".to_string(), json!(step.id.to_string()));
                context.insert("retry_count".to_string(), json!(step.retry_count));
                let executor = Arc::clone(&self.executor);
                async move { (step.id, executor.execute(step, &context).await) }
            });
            let outcomes = futures::future::join_all(executions).await;

            // Bookkeeping goes back through the per-task serialization point.
            let verdict = {
                let _task = cell.lock().await;
                let mut plan = plan_cell.lock().await;
                apply_outcomes(&mut plan, outcomes)
            };

            match verdict {
                RoundVerdict::Continue => {}
                RoundVerdict::FailTask(error) => {
                    plan_cell.lock().await.status = PlanStatus::Failed;
                    self.fail_task(&cell, &error.message, agent_id, started).await;
                    return Ok(TaskStatus::Failed);
                }
                RoundVerdict::Replan(error, step_id) => {
                    match self
                        .start_replan(&cell, &plan_cell, error, step_id, &mut replans_used, agent_id, autonomy, started)
                        .await?
                    {
                        Some(parked) => return Ok(parked),
                        None => {}
                    }
                }
            }
        }
    }

    /// Degrade the task to `Failed` and charge the agent's record
    async fn fail_task(
        &self,
        cell: &Arc<tokio::sync::Mutex<Task>>,
        reason: &str,
        agent_id: Option<aegis_core::AgentId>,
        started: Instant,
    ) {
        let mut task = cell.lock().await;
        lifecycle::transition(&mut task, TaskStatus::Failed, Role::Executor, Some(reason), None);
        if let Some(agent) = agent_id {
            self.agents
                .record_execution(agent, false, started.elapsed().as_millis() as u64);
        }
        tracing::warn!(task_id = %task.id, reason, "task failed");
    }

    /// Replace the current plan version after a replanning-required failure.
    ///
    /// The old version is marked `Failed` first; generation runs without the
    /// task lock; any error from the replan/approval path is contained by
    /// degrading the task to `Failed`. Returns `Some(status)` when the task
    /// parked (`OnHold` awaiting re-approval) or terminally stopped, `None`
    /// when execution should continue with the new version.
    #[allow(clippy::too_many_arguments)]
    async fn start_replan(
        &self,
        cell: &Arc<tokio::sync::Mutex<Task>>,
        plan_cell: &Arc<tokio::sync::Mutex<Plan>>,
        error: ExecutionError,
        failed_step: StepId,
        replans_used: &mut u32,
        agent_id: Option<aegis_core::AgentId>,
        autonomy: aegis_core::AutonomyLevel,
        started: Instant,
    ) -> Result<Option<TaskStatus>, EngineError> {
        let task_id = {
            let task = cell.lock().await;
            task.id
        };

        if *replans_used >= self.config.max_replans {
            plan_cell.lock().await.status = PlanStatus::Failed;
            self.fail_task(cell, "replan budget exhausted", agent_id, started).await;
            return Ok(Some(TaskStatus::Failed));
        }
        *replans_used += 1;

        // Freeze the failed version and snapshot what carries forward.
        let old_plan = {
            let mut plan = plan_cell.lock().await;
            plan.status = PlanStatus::Failed;
            plan.clone()
        };

        let mut context = Map::new();
        context.insert(
            "completed_outputs".to_string(),
            json!(old_plan
                .completed_outputs()
                .into_iter()
                .map(|(id, output)| (id.to_string(), output))
                .collect::<Map<_, _>>()),
        );
        context.insert(
            "error".to_string(),
            json!({
                "message": &error.message,
                "severity": error.severity,
                "category": error.category,
                "failed_step": failed_step.to_string(),
            }),
        );

        tracing::info!(
            task_id = %task_id,
            version = old_plan.version,
            severity = ?error.severity,
            "replanning"
        );

        // Slow external call; no task lock held.
        let replanned = async {
            let blueprint = self
                .generator
                .replan(&old_plan, &error.message, &context)
                .await?;
            old_plan.next_version(blueprint).map_err(EngineError::from)
        }
        .await;

        let mut new_plan = match replanned {
            Ok(plan) => plan,
            Err(e) => {
                // Contained: the old plan is already Failed, the task
                // degrades, nothing is left ambiguous.
                tracing::warn!(task_id = %task_id, error = %e, "replanning failed");
                self.fail_task(cell, "replanning failed", agent_id, started).await;
                return Ok(Some(TaskStatus::Failed));
            }
        };

        // A High/Critical failure got us here, so the replacement plan goes
        // through the approval gate exactly as an initial plan would.
        let agent_record = agent_id.and_then(|a| self.agents.get(a));
        let decision =
            should_require_approval(&new_plan, agent_record.as_ref(), None, Some(autonomy), false);

        if decision.requires_approval {
            let mut task = cell.lock().await;
            // The task may have been cancelled or parked while generation
            // ran; in that case it keeps pointing at the failed version and
            // the replacement is discarded.
            if task.status != TaskStatus::InProgress {
                return Ok(Some(task.status));
            }
            let plan_id = self.plans.insert(new_plan);
            let mut metadata = Map::new();
            metadata.insert("approval".to_string(), json!(&decision));
            metadata.insert("plan_id".to_string(), json!(plan_id.to_string()));
            lifecycle::transition(
                &mut task,
                TaskStatus::OnHold,
                Role::System,
                Some(decision.reason.as_str()),
                Some(metadata),
            );
            task.plan_id = Some(plan_id);
            task.context
                .data
                .insert("approval".to_string(), json!(&decision));
            return Ok(Some(task.status));
        }

        new_plan.status = PlanStatus::Executing;
        let mut task = cell.lock().await;
        if task.status != TaskStatus::InProgress {
            return Ok(Some(task.status));
        }
        let plan_id = self.plans.insert(new_plan);
        task.plan_id = Some(plan_id);
        task.context
            .data
            .insert("approval".to_string(), json!(&decision));
        Ok(None)
    }
}

/// Record a round of step outcomes onto the plan and decide what next.
///
/// Replanning failures take precedence over exhausted retries; retryable
/// failures re-queue the step with its retry count bumped so repeated
/// timeouts escalate in the classifier.
fn apply_outcomes(
    plan: &mut Plan,
    outcomes: Vec<(StepId, StepOutcome)>,
) -> RoundVerdict {
    let mut failure: Option<RoundVerdict> = None;

    for (step_id, outcome) in outcomes {
        let Some(step) = plan.step_mut(step_id) else { continue };
        match outcome {
            StepOutcome::Completed(output) => {
                step.status = StepStatus::Completed;
                step.output = Some(output);
            }
            StepOutcome::Failed { message, error_type } => {
                let mut context = Map::new();
                context.insert("step_id".to_string(), json!(step_id.to_string()));
                context.insert("retry_count".to_string(), json!(step.retry_count));
                let verdict = classify(&message, error_type.as_deref(), Some(&context));
                tracing::warn!(
                    step = %step_id,
                    severity = ?verdict.severity,
                    category = ?verdict.category,
                    replan = verdict.requires_replanning,
                    "step failed"
                );

                if verdict.requires_replanning {
                    step.status = StepStatus::Failed;
                    failure = Some(RoundVerdict::Replan(verdict, step_id));
                } else if step.retry_count < step.max_retries {
                    step.retry_count += 1;
                    // Stays Pending; picked up again next round.
                } else {
                    step.status = StepStatus::Failed;
                    if !matches!(failure, Some(RoundVerdict::Replan(..))) {
                        failure = Some(RoundVerdict::FailTask(verdict));
                    }
                }
            }
        }
    }

    failure.unwrap_or(RoundVerdict::Continue)
}
