//! Adaptive approval gate.
//!
//! Combines the configured autonomy level, computed task risk, and agent
//! trust history into an accept/hold decision. Rules short-circuit in a
//! fixed order; the decision always carries the scores actually used so an
//! auditor can reconstruct it without recomputation.

use crate::evaluator::{calculate_agent_trust_score, calculate_task_risk_level};
use crate::plan::Plan;
use crate::types::{AgentRecord, AutonomyLevel};
use serde::{Deserialize, Serialize};

/// Risk at or above which approval is always required
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;
/// Lower bound of the medium-risk band
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;
/// Trust below which medium risk still requires approval
pub const LOW_TRUST_THRESHOLD: f64 = 0.6;

/// Fixed reason codes explaining an approval decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalReason {
    /// Caller forced approval regardless of evaluation
    OverrideRisk,
    /// Autonomy level 0 (read-only) always requires approval
    #[serde(rename = "autonomy_level_0")]
    AutonomyLevel0,
    /// Autonomy level 1 (step-by-step confirmation) always requires approval
    #[serde(rename = "autonomy_level_1")]
    AutonomyLevel1,
    /// Autonomy level 2 (plan-level confirmation) always requires approval
    #[serde(rename = "autonomy_level_2")]
    AutonomyLevel2,
    /// Risk at or above the high threshold
    HighRisk,
    /// Medium risk combined with insufficient trust
    MediumRiskLowTrust,
    /// Level 4 with acceptable risk and trust; approval skipped
    #[serde(rename = "autonomy_level_4")]
    AutonomyLevel4,
    /// Risk and trust acceptable below level 4; approval skipped
    LowRisk,
}

impl ApprovalReason {
    /// Stable string form used in audit entries and UI display
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalReason::OverrideRisk => "override_risk",
            ApprovalReason::AutonomyLevel0 => "autonomy_level_0",
            ApprovalReason::AutonomyLevel1 => "autonomy_level_1",
            ApprovalReason::AutonomyLevel2 => "autonomy_level_2",
            ApprovalReason::HighRisk => "high_risk",
            ApprovalReason::MediumRiskLowTrust => "medium_risk_low_trust",
            ApprovalReason::AutonomyLevel4 => "autonomy_level_4",
            ApprovalReason::LowRisk => "low_risk",
        }
    }
}

impl std::fmt::Display for ApprovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate output. Transient; recorded into the task's audit metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Whether a human must sign off before execution
    pub requires_approval: bool,
    /// Why the decision came out this way
    pub reason: ApprovalReason,
    /// Trust score actually used
    pub agent_trust_score: f64,
    /// Risk level actually used
    pub task_risk_level: f64,
}

/// Decide whether a plan may proceed unattended.
///
/// Evaluation order, first applicable rule wins:
/// 1. `override_risk` forces approval.
/// 2. Autonomy 0/1/2 always requires approval.
/// 3. Risk at or above [`HIGH_RISK_THRESHOLD`] always requires approval
///    (risk is computed from the plan when not supplied).
/// 4. Medium risk with trust below [`LOW_TRUST_THRESHOLD`] requires
///    approval; otherwise approval is skipped.
#[must_use]
pub fn should_require_approval(
    plan: &Plan,
    agent: Option<&AgentRecord>,
    task_risk_level: Option<f64>,
    autonomy: Option<AutonomyLevel>,
    override_risk: bool,
) -> ApprovalDecision {
    let agent_trust_score = agent.map(calculate_agent_trust_score).unwrap_or(0.0);
    let task_risk_level = task_risk_level
        .unwrap_or_else(|| calculate_task_risk_level(&plan.description, &plan.steps));

    let decide = |requires_approval: bool, reason: ApprovalReason| {
        tracing::debug!(
            plan_id = %plan.id,
            requires_approval,
            reason = %reason,
            trust = agent_trust_score,
            risk = task_risk_level,
            "approval gate decision"
        );
        ApprovalDecision {
            requires_approval,
            reason,
            agent_trust_score,
            task_risk_level,
        }
    };

    if override_risk {
        return decide(true, ApprovalReason::OverrideRisk);
    }

    match autonomy {
        Some(AutonomyLevel::L0) => return decide(true, ApprovalReason::AutonomyLevel0),
        Some(AutonomyLevel::L1) => return decide(true, ApprovalReason::AutonomyLevel1),
        Some(AutonomyLevel::L2) => return decide(true, ApprovalReason::AutonomyLevel2),
        _ => {}
    }

    if task_risk_level >= HIGH_RISK_THRESHOLD {
        return decide(true, ApprovalReason::HighRisk);
    }

    if task_risk_level >= MEDIUM_RISK_THRESHOLD && agent_trust_score < LOW_TRUST_THRESHOLD {
        return decide(true, ApprovalReason::MediumRiskLowTrust);
    }

    if autonomy == Some(AutonomyLevel::L4) {
        decide(false, ApprovalReason::AutonomyLevel4)
    } else {
        decide(false, ApprovalReason::LowRisk)
    }
}
