//! Aegis engine: the orchestration loop.
//!
//! Drives tasks through the `aegis-core` lifecycle using injected
//! collaborators:
//! - [`traits::PlanGenerator`] / [`traits::StepExecutor`]: the external
//!   plan-producer and step-runner seams
//! - [`store`]: id-keyed stores with per-task serialization
//! - [`engine::OrchestrationEngine`]: execution, retry, auto-replanning,
//!   and approval routing

pub mod engine;
pub mod error;
pub mod store;
pub mod traits;

pub use engine::{EngineConfig, OrchestrationEngine};
pub use error::EngineError;
pub use store::{AgentRegistry, PlanStore, TaskStore};
pub use traits::{PlanGenerator, StepExecutor, StepOutcome};
