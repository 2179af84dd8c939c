//! Injected in-memory stores keyed by entity id.
//!
//! Each task lives behind its own `tokio::sync::Mutex`; that mutex is the
//! single serialization point for status writes and step bookkeeping on
//! that task. Distinct tasks share nothing, so unrelated work never
//! contends. There is no process-wide registry: stores are owned by the
//! engine instance that created them.

use aegis_core::{AgentId, AgentRecord, Plan, PlanId, Task, TaskId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tasks keyed by id, each behind a per-task lock
#[derive(Debug, Default)]
pub struct TaskStore {
    inner: DashMap<TaskId, Arc<Mutex<Task>>>,
}

impl TaskStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, returning its id
    pub fn insert(&self, task: Task) -> TaskId {
        let id = task.id;
        self.inner.insert(id, Arc::new(Mutex::new(task)));
        id
    }

    /// Handle to a task's lock cell
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<Arc<Mutex<Task>>> {
        self.inner.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Number of stored tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Plan versions keyed by id.
///
/// Plans are mutated (step bookkeeping, status) only while the owning
/// task's lock is held, so a plain cell per plan suffices.
#[derive(Debug, Default)]
pub struct PlanStore {
    inner: DashMap<PlanId, Arc<Mutex<Plan>>>,
}

impl PlanStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a plan version, returning its id
    pub fn insert(&self, plan: Plan) -> PlanId {
        let id = plan.id;
        self.inner.insert(id, Arc::new(Mutex::new(plan)));
        id
    }

    /// Handle to a plan's cell
    #[must_use]
    pub fn get(&self, id: PlanId) -> Option<Arc<Mutex<Plan>>> {
        self.inner.get(&id).map(|e| Arc::clone(e.value()))
    }
}

/// Agent execution histories keyed by agent id
#[derive(Debug, Default)]
pub struct AgentRegistry {
    inner: DashMap<AgentId, AgentRecord>,
}

impl AgentRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, starting from an empty history if new
    pub fn register(&self, agent_id: AgentId) {
        self.inner
            .entry(agent_id)
            .or_insert_with(|| AgentRecord::new(agent_id));
    }

    /// Seed an agent with an existing history
    pub fn insert(&self, record: AgentRecord) {
        self.inner.insert(record.agent_id, record);
    }

    /// Snapshot of an agent's record
    #[must_use]
    pub fn get(&self, agent_id: AgentId) -> Option<AgentRecord> {
        self.inner.get(&agent_id).map(|e| e.value().clone())
    }

    /// Record one completed execution for an agent
    pub fn record_execution(&self, agent_id: AgentId, success: bool, elapsed_ms: u64) {
        self.inner
            .entry(agent_id)
            .or_insert_with(|| AgentRecord::new(agent_id))
            .record_execution(success, elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::Task;

    #[tokio::test]
    async fn task_store_round_trip() {
        let store = TaskStore::new();
        let id = store.insert(Task::new("t"));

        let cell = store.get(id).unwrap();
        let task = cell.lock().await;
        assert_eq!(task.id, id);
        assert!(store.get(TaskId::new()).is_none());
    }

    #[test]
    fn agent_registry_accumulates_history() {
        let registry = AgentRegistry::new();
        let id = AgentId::new();

        registry.record_execution(id, true, 100);
        registry.record_execution(id, false, 300);

        let record = registry.get(id).unwrap();
        assert_eq!(record.total_tasks_executed, 2);
        assert_eq!(record.successful_tasks, 1);
        assert!((record.average_execution_time_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn register_is_idempotent() {
        let registry = AgentRegistry::new();
        let id = AgentId::new();

        registry.record_execution(id, true, 50);
        registry.register(id);

        assert_eq!(registry.get(id).unwrap().total_tasks_executed, 1);
    }
}
