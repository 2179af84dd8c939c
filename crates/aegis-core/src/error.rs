//! Error types for the core.
//!
//! Classification verdicts are data, never errors; the variants here cover
//! contract violations only (malformed input that normal operation should
//! never produce).

/// Core contract errors
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Status string not in the canonical or legacy enumeration
    #[error("unknown task status: {0}")]
    UnknownStatus(String),

    /// Autonomy level outside 0-4
    #[error("invalid autonomy level: {0} (expected 0-4)")]
    InvalidAutonomyLevel(u8),

    /// Plan violates a structural invariant
    #[error("malformed plan: {0}")]
    MalformedPlan(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_error_display() {
        let err = CoreError::UnknownStatus("BOGUS".to_string());
        assert!(err.to_string().contains("unknown task status"));

        let err = CoreError::InvalidAutonomyLevel(9);
        assert!(err.to_string().contains("9"));
    }
}
