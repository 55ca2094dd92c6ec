//! Error taxonomy for the probe engine.

use std::path::PathBuf;

use crate::registry::ProbeStatus;

/// Errors produced while loading or persisting configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("'{0}' is a directory; expected a normal file")]
    NotAFile(PathBuf),

    #[error("config io error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to serialize config state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Probe engine errors.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe not found: {0}")]
    NotFound(String),

    #[error("probe already registered: {0}")]
    DuplicateRegistration(String),

    #[error("probe '{probe}' execution failed: {reason}")]
    ExecutionFailure { probe: String, reason: String },

    #[error("policy evaluation failed: {0}")]
    PolicyEvaluationFailure(String),

    #[error("invalid status transition for '{probe}': {from} -> {to}")]
    InvalidTransition {
        probe: String,
        from: ProbeStatus,
        to: ProbeStatus,
    },

    #[error("cloud unavailable: {0}")]
    CloudUnavailable(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl ProbeError {
    /// Registry-structural errors are surfaced to the caller rather than
    /// folded into a probe status.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ProbeError::NotFound(_) | ProbeError::DuplicateRegistration(_)
        )
    }
}

/// Result type for probe engine operations.
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError::NotFound("pod_security".to_string());
        assert_eq!(err.to_string(), "probe not found: pod_security");

        let err = ProbeError::DuplicateRegistration("pod_security".to_string());
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_invalid_transition_names_both_states() {
        let err = ProbeError::InvalidTransition {
            probe: "iam".to_string(),
            from: ProbeStatus::Excluded,
            to: ProbeStatus::Running,
        };
        let msg = err.to_string();
        assert!(msg.contains("Excluded"));
        assert!(msg.contains("Running"));
    }

    #[test]
    fn test_structural_classification() {
        assert!(ProbeError::NotFound("a".into()).is_structural());
        assert!(ProbeError::DuplicateRegistration("a".into()).is_structural());
        assert!(!ProbeError::ExecutionFailure {
            probe: "a".into(),
            reason: "exit 1".into()
        }
        .is_structural());
        assert!(!ProbeError::PolicyEvaluationFailure("not a bool".into()).is_structural());
    }

    #[test]
    fn test_config_error_wraps_into_probe_error() {
        let err: ProbeError = ConfigError::NotAFile(PathBuf::from("/tmp")).into();
        assert!(err.to_string().contains("is a directory"));
    }
}
