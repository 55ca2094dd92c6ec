//! Probe lifecycle status and group classification.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered probe.
///
/// ```text
/// Pending ──► Excluded
///    │
///    └──► Running ──► CompleteSuccess | CompleteFail | Error
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProbeStatus {
    Pending,
    Running,
    CompleteSuccess,
    CompleteFail,
    Error,
    Excluded,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Pending => "Pending",
            ProbeStatus::Running => "Running",
            ProbeStatus::CompleteSuccess => "CompleteSuccess",
            ProbeStatus::CompleteFail => "CompleteFail",
            ProbeStatus::Error => "Error",
            ProbeStatus::Excluded => "Excluded",
        }
    }

    /// Terminal states never change again within a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProbeStatus::CompleteSuccess
                | ProbeStatus::CompleteFail
                | ProbeStatus::Error
                | ProbeStatus::Excluded
        )
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    pub fn can_transition_to(&self, next: ProbeStatus) -> bool {
        matches!(
            (self, next),
            (ProbeStatus::Pending, ProbeStatus::Excluded)
                | (ProbeStatus::Pending, ProbeStatus::Running)
                | (ProbeStatus::Running, ProbeStatus::CompleteSuccess)
                | (ProbeStatus::Running, ProbeStatus::CompleteFail)
                | (ProbeStatus::Running, ProbeStatus::Error)
        )
    }

    /// Process exit code contributed by a settled probe.
    ///
    /// `None` while the probe has not reached a terminal state.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProbeStatus::CompleteSuccess | ProbeStatus::Excluded => Some(0),
            ProbeStatus::CompleteFail | ProbeStatus::Error => Some(1),
            ProbeStatus::Pending | ProbeStatus::Running => None,
        }
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance domain a probe belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Kubernetes,
    CloudDriver,
    CoreEngine,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Kubernetes => "kubernetes",
            Group::CloudDriver => "clouddriver",
            Group::CoreEngine => "coreengine",
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
