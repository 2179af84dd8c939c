//! Risk and trust evaluation.
//!
//! Pure scoring functions: agent trust from lifetime execution history,
//! task risk from plan size and destructive-keyword content. Both map into
//! `[0, 1]` and feed the approval gate.

use crate::plan::PlanStep;
use crate::types::AgentRecord;

/// Cold-start prior: an unproven agent scores 0.3, between a proven failure
/// and a proven veteran.
const TRUST_PRIOR_SUCCESSES: f64 = 3.0;
const TRUST_PRIOR_WEIGHT: f64 = 10.0;

/// Risk contributed per step, and its cap
const STEP_RISK_WEIGHT: f64 = 0.02;
const STEP_RISK_CAP: f64 = 0.4;

/// Risk contributed per distinct destructive keyword, and its cap
const KEYWORD_RISK_WEIGHT: f64 = 0.25;
const KEYWORD_RISK_CAP: f64 = 0.6;

/// Destructive verbs that mark a plan as consequential/irreversible
const DESTRUCTIVE_KEYWORDS: [&str; 10] = [
    "delete",
    "drop",
    "remove all",
    "rm -rf",
    "truncate",
    "destroy",
    "wipe",
    "purge",
    "erase",
    "force push",
];

/// Estimate an agent's reliability in `[0, 1]`.
///
/// Success ratio shrunk toward the cold-start prior: with few executions
/// the score stays near 0.3; with many it converges on the true ratio.
#[must_use]
pub fn calculate_agent_trust_score(agent: &AgentRecord) -> f64 {
    let total = agent.total_tasks_executed as f64;
    let successes = agent.successful_tasks.min(agent.total_tasks_executed) as f64;
    ((successes + TRUST_PRIOR_SUCCESSES) / (total + TRUST_PRIOR_WEIGHT)).clamp(0.0, 1.0)
}

/// Estimate how consequential a plan is, in `[0, 1]`.
///
/// Non-decreasing in step count; strictly higher when the description or
/// any step text contains a destructive keyword.
#[must_use]
pub fn calculate_task_risk_level(description: &str, steps: &[PlanStep]) -> f64 {
    let step_risk = (steps.len() as f64 * STEP_RISK_WEIGHT).min(STEP_RISK_CAP);

    let mut text = description.to_lowercase();
    for step in steps {
        text.push(' ');
        text.push_str(&step.description.to_lowercase());
    }
    let keyword_hits = DESTRUCTIVE_KEYWORDS
        .iter()
        .filter(|k| text.contains(*k))
        .count();
    let keyword_risk = (keyword_hits as f64 * KEYWORD_RISK_WEIGHT).min(KEYWORD_RISK_CAP);

    (step_risk + keyword_risk).min(1.0)
}
