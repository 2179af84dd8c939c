//! Execution-error classifier.
//!
//! A pure, total function from a raw failure message (plus optional error
//! type and context) to a severity/category verdict. Verdicts are data,
//! never errors: the orchestration loop decides retry versus replan from
//! them. Rules live in one ordered table so the first-match-wins contract
//! stays explicit and testable.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Failure severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational; never produced by the rule table today
    Low,
    /// Retryable without replanning
    Medium,
    /// Requires replanning
    High,
    /// Requires replanning; plan is unsalvageable as-is
    Critical,
}

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Infrastructure the plan runs on (databases, servers)
    Environment,
    /// A collaborator the plan relies on (agents, tools, step deps)
    Dependency,
    /// Rejected input or parameters
    Validation,
    /// The plan itself is wrong
    Logic,
    /// An operation exceeded its deadline
    Timeout,
    /// Memory, quota, or capacity exhaustion
    Resource,
    /// Nothing matched
    Unknown,
}

/// Classifier verdict. Transient; carried in replan context, not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    /// Original failure message
    pub message: String,
    /// Original error type, if the source reported one
    pub error_type: Option<String>,
    /// Assigned severity
    pub severity: Severity,
    /// Assigned category
    pub category: ErrorCategory,
    /// Derived: true iff severity is High or Critical
    pub requires_replanning: bool,
    /// Context fields copied verbatim, plus the winning pattern
    pub metadata: Map<String, Value>,
}

impl ExecutionError {
    fn new(
        message: &str,
        error_type: Option<&str>,
        severity: Severity,
        category: ErrorCategory,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            message: message.to_string(),
            error_type: error_type.map(str::to_string),
            severity,
            category,
            requires_replanning: severity >= Severity::High,
            metadata,
        }
    }
}

struct PatternRule {
    pattern: Regex,
    category: ErrorCategory,
    severity: Severity,
}

impl PatternRule {
    fn new(fragment: &str, category: ErrorCategory, severity: Severity) -> Self {
        Self {
            // Fragments are static and known-valid; a bad one is a
            // programming error caught by the table test below.
            pattern: RegexBuilder::new(fragment)
                .case_insensitive(true)
                .build()
                .unwrap_or_else(|e| panic!("invalid classifier pattern {fragment:?}: {e}")),
            category,
            severity,
        }
    }
}

/// Ordered rule table: CRITICAL tier, then HIGH tier, then the generic
/// TIMEOUT tier. First match wins; rules never combine.
static RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    use ErrorCategory::*;
    use Severity::*;
    vec![
        // CRITICAL tier: the plan cannot proceed in its current shape.
        PatternRule::new(
            r"plan (has )?no steps|empty plan|plan is empty|invalid plan structure",
            Logic,
            Critical,
        ),
        PatternRule::new(
            r"missing dependency|circular dependency|dependency cycle|unresolved dependency",
            Dependency,
            Critical,
        ),
        PatternRule::new(
            r"no suitable (model|server)|no (model|server) (found|available)",
            Resource,
            Critical,
        ),
        PatternRule::new(
            r"(database|db) connection (failed|refused|lost|error)|could not connect to (the )?database",
            Environment,
            Critical,
        ),
        PatternRule::new(
            r"contradictory step|conflicting step sequence|steps contradict",
            Logic,
            Critical,
        ),
        // HIGH tier: replanning required, plan structure may survive.
        PatternRule::new(
            r"(agent|tool) .*(not found|not active|inactive|unavailable)|no such (agent|tool)",
            Dependency,
            High,
        ),
        PatternRule::new(
            r"function call failed|parameter validation failed|invalid (parameter|argument)",
            Validation,
            High,
        ),
        PatternRule::new(
            r"memory limit|out of memory|resource (unavailable|exhausted)|quota exceeded",
            Resource,
            High,
        ),
        PatternRule::new(r"execution time(d)? ?out", Timeout, High),
        // TIMEOUT tier: ordinary timeouts retry first; escalation to
        // CRITICAL happens only after repeated retries (see classify).
        PatternRule::new(r"time(d)? ?out|timeout", Timeout, Medium),
    ]
});

/// How many retries promote a timeout to `Critical`
const TIMEOUT_ESCALATION_RETRIES: u64 = 2;

const VALIDATION_MESSAGE_MARKERS: [&str; 3] = ["not found", "invalid", "missing"];

fn retry_count(context: Option<&Map<String, Value>>) -> u64 {
    context
        .and_then(|c| c.get("retry_count"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Classify a raw failure into a severity/category verdict.
///
/// Deterministic, side-effect-free, and total: unknown input falls back to
/// `Medium`/`Unknown`, never an error. All context fields are copied
/// verbatim into the verdict's metadata, alongside the winning pattern.
#[must_use]
pub fn classify(
    message: &str,
    error_type: Option<&str>,
    context: Option<&Map<String, Value>>,
) -> ExecutionError {
    let mut metadata = context.cloned().unwrap_or_default();

    for rule in RULES.iter() {
        if rule.pattern.is_match(message) {
            let mut severity = rule.severity;
            // Timeouts that keep recurring are a planning problem, not a
            // transient one.
            if rule.category == ErrorCategory::Timeout
                && retry_count(context) >= TIMEOUT_ESCALATION_RETRIES
            {
                severity = Severity::Critical;
            }
            metadata.insert(
                "matched_pattern".to_string(),
                Value::String(rule.pattern.as_str().to_string()),
            );
            return ExecutionError::new(message, error_type, severity, rule.category, metadata);
        }
    }

    // Validation fallback: a validation-flavored error type whose message
    // names a rejected or absent input.
    let lower_message = message.to_lowercase();
    let validation_type = error_type
        .map(|t| t.to_lowercase().contains("validation") || t.to_lowercase().contains("valueerror"))
        .unwrap_or(false);
    if validation_type
        && VALIDATION_MESSAGE_MARKERS
            .iter()
            .any(|m| lower_message.contains(m))
    {
        metadata.insert(
            "matched_pattern".to_string(),
            Value::String("validation_fallback".to_string()),
        );
        return ExecutionError::new(
            message,
            error_type,
            Severity::High,
            ErrorCategory::Validation,
            metadata,
        );
    }

    metadata.insert("matched_pattern".to_string(), Value::String("none".to_string()));
    ExecutionError::new(
        message,
        error_type,
        Severity::Medium,
        ErrorCategory::Unknown,
        metadata,
    )
}

/// Whether a failure warrants discarding the current plan version
#[inline]
#[must_use]
pub fn requires_replanning(
    message: &str,
    error_type: Option<&str>,
    context: Option<&Map<String, Value>>,
) -> bool {
    classify(message, error_type, context).requires_replanning
}

/// Whether a failure is `Critical`
#[inline]
#[must_use]
pub fn is_critical_error(
    message: &str,
    error_type: Option<&str>,
    context: Option<&Map<String, Value>>,
) -> bool {
    classify(message, error_type, context).severity == Severity::Critical
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(retries: u64) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("retry_count".to_string(), Value::from(retries));
        m
    }

    #[test]
    fn rule_table_compiles() {
        assert!(!RULES.is_empty());
    }

    #[test]
    fn empty_plan_is_critical_logic() {
        let verdict = classify("Plan has no steps", None, None);
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.category, ErrorCategory::Logic);
        assert!(verdict.requires_replanning);
    }

    #[test]
    fn circular_dependency_is_critical() {
        let verdict = classify("Circular dependency detected in plan", None, None);
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.category, ErrorCategory::Dependency);
    }

    #[test]
    fn database_failure_is_critical_environment() {
        let verdict = classify("database connection refused", None, None);
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.category, ErrorCategory::Environment);
    }

    #[test]
    fn no_suitable_model_is_critical_resource() {
        let verdict = classify("No suitable model found for request", None, None);
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.category, ErrorCategory::Resource);
    }

    #[test]
    fn missing_agent_is_high_dependency() {
        let verdict = classify("Agent 'research-1' not found", None, None);
        assert_eq!(verdict.severity, Severity::High);
        assert_eq!(verdict.category, ErrorCategory::Dependency);
        assert!(verdict.requires_replanning);
    }

    #[test]
    fn parameter_validation_is_high() {
        let verdict = classify("parameter validation failed for 'query'", None, None);
        assert_eq!(verdict.severity, Severity::High);
        assert_eq!(verdict.category, ErrorCategory::Validation);
    }

    #[test]
    fn memory_limit_is_high_resource() {
        let verdict = classify("memory limit exceeded while embedding", None, None);
        assert_eq!(verdict.severity, Severity::High);
        assert_eq!(verdict.category, ErrorCategory::Resource);
    }

    #[test]
    fn execution_timeout_is_high() {
        let verdict = classify("execution timed out after 300s", None, None);
        assert_eq!(verdict.severity, Severity::High);
        assert_eq!(verdict.category, ErrorCategory::Timeout);
    }

    #[test]
    fn request_timeout_retries_before_escalating() {
        let verdict = classify("Request timeout", None, Some(&ctx(0)));
        assert_eq!(verdict.severity, Severity::Medium);
        assert_eq!(verdict.category, ErrorCategory::Timeout);
        assert!(!verdict.requires_replanning);

        let verdict = classify("Request timeout", None, Some(&ctx(2)));
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.requires_replanning);
    }

    #[test]
    fn validation_fallback_requires_type_and_marker() {
        let verdict = classify("field 'name' is missing", Some("ValidationError"), None);
        assert_eq!(verdict.severity, Severity::High);
        assert_eq!(verdict.category, ErrorCategory::Validation);

        // Marker without validation-flavored type stays unknown.
        let verdict = classify("field 'name' is missing", Some("RuntimeError"), None);
        assert_eq!(verdict.category, ErrorCategory::Unknown);

        // Validation type without marker stays unknown.
        let verdict = classify("something odd happened", Some("ValidationError"), None);
        assert_eq!(verdict.category, ErrorCategory::Unknown);
    }

    #[test]
    fn unmatched_falls_back_to_medium_unknown() {
        let verdict = classify("gremlins", None, None);
        assert_eq!(verdict.severity, Severity::Medium);
        assert_eq!(verdict.category, ErrorCategory::Unknown);
        assert!(!verdict.requires_replanning);
    }

    #[test]
    fn classification_is_case_insensitive() {
        let verdict = classify("CIRCULAR DEPENDENCY DETECTED", None, None);
        assert_eq!(verdict.severity, Severity::Critical);
    }

    #[test]
    fn classification_is_deterministic() {
        let a = classify("Agent x not found", Some("LookupError"), Some(&ctx(1)));
        let b = classify("Agent x not found", Some("LookupError"), Some(&ctx(1)));
        assert_eq!(a.severity, b.severity);
        assert_eq!(a.category, b.category);
        assert_eq!(a.requires_replanning, b.requires_replanning);
        assert_eq!(a.metadata, b.metadata);
    }

    #[test]
    fn context_copied_verbatim_with_winning_pattern() {
        let mut context = ctx(1);
        context.insert("step_id".to_string(), Value::from("step_3"));
        let verdict = classify("tool web-search unavailable", None, Some(&context));

        assert_eq!(verdict.metadata.get("retry_count"), Some(&Value::from(1)));
        assert_eq!(verdict.metadata.get("step_id"), Some(&Value::from("step_3")));
        assert!(verdict.metadata.contains_key("matched_pattern"));
    }

    #[test]
    fn first_match_wins_over_later_tiers() {
        // Mentions both a circular dependency (CRITICAL tier) and a timeout
        // (TIMEOUT tier); the earlier rule decides.
        let verdict = classify("circular dependency found after timeout", None, None);
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.category, ErrorCategory::Dependency);
    }

    #[test]
    fn projections_agree_with_classify() {
        for message in [
            "Plan has no steps",
            "Request timeout",
            "Agent x not found",
            "gremlins",
        ] {
            let verdict = classify(message, None, None);
            assert_eq!(
                requires_replanning(message, None, None),
                verdict.severity >= Severity::High
            );
            assert_eq!(
                is_critical_error(message, None, None),
                verdict.severity == Severity::Critical
            );
        }
    }
}
