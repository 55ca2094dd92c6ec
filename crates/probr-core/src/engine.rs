//! Boundary to the external BDD test engine.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{ProbeError, ProbeResult};
use crate::registry::{Probe, ProbeStatus, SuiteContext};

/// Outcome reported by the engine for one feature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineOutcome {
    Passed,
    Failed,
    Errored,
}

impl EngineOutcome {
    /// Runner exit codes: 0 passed, 1 scenario failures, anything else an
    /// engine error.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => EngineOutcome::Passed,
            1 => EngineOutcome::Failed,
            _ => EngineOutcome::Errored,
        }
    }

    /// Terminal probe status implied by this outcome.
    pub fn status(&self) -> ProbeStatus {
        match self {
            EngineOutcome::Passed => ProbeStatus::CompleteSuccess,
            EngineOutcome::Failed => ProbeStatus::CompleteFail,
            EngineOutcome::Errored => ProbeStatus::Error,
        }
    }
}

/// Result of running one feature.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub outcome: EngineOutcome,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl EngineReport {
    /// A report carrying only an outcome, with the matching exit code.
    pub fn from_outcome(outcome: EngineOutcome) -> Self {
        let exit_code = match outcome {
            EngineOutcome::Passed => 0,
            EngineOutcome::Failed => 1,
            EngineOutcome::Errored => 2,
        };
        Self {
            outcome,
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }
}

/// One engine invocation: a feature, its probe's hooks and the tag filter.
#[derive(Clone)]
pub struct EngineRun {
    pub probe: Arc<dyn Probe>,
    pub feature_path: PathBuf,
    pub tags: String,
}

impl std::fmt::Debug for EngineRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRun")
            .field("probe", &self.probe.name())
            .field("feature_path", &self.feature_path)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Executes the scenarios of a feature file.
///
/// Implementations call the probe's suite hook once and its scenario hook
/// before each scenario they run in-process. `Err` means the engine could not
/// be driven at all; failing scenarios are an `Ok` report.
#[async_trait]
pub trait TestEngine: Send + Sync {
    async fn run(&self, run: EngineRun) -> ProbeResult<EngineReport>;
}

/// Runs features through an external runner process.
///
/// Invoked as `<command...> [--tags <expr>] <feature>`. Scenarios execute
/// out of process, so only the suite hook runs; variables it sets in
/// [`SuiteContext::env`] are passed to the child.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    command: Vec<String>,
}

impl CommandEngine {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Full argument vector for a run, executable first.
    pub fn argv(&self, run: &EngineRun) -> Vec<String> {
        let mut argv = self.command.clone();
        if !run.tags.is_empty() {
            argv.push("--tags".to_string());
            argv.push(run.tags.clone());
        }
        argv.push(run.feature_path.to_string_lossy().into_owned());
        argv
    }
}

#[async_trait]
impl TestEngine for CommandEngine {
    async fn run(&self, run: EngineRun) -> ProbeResult<EngineReport> {
        let probe_name = run.probe.name().to_string();
        let failure = |reason: String| ProbeError::ExecutionFailure {
            probe: probe_name.clone(),
            reason,
        };

        if self.command.is_empty() {
            return Err(failure("engine command is empty".to_string()));
        }

        let mut suite = SuiteContext::new(&probe_name, &run.feature_path, &run.tags);
        run.probe.initialize(&mut suite);

        let argv = self.argv(&run);
        debug!(probe = %probe_name, argv = ?argv, "spawning engine");

        let start = Instant::now();
        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .envs(&suite.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failure(format!("failed to spawn '{}': {}", argv[0], e)))?
            .wait_with_output()
            .await
            .map_err(|e| failure(e.to_string()))?;

        // Killed by a signal: no exit code, treat as an engine error.
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(EngineReport {
            outcome: EngineOutcome::from_exit_code(exit_code),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FeatureProbe;

    fn run_for(path: &str, tags: &str) -> EngineRun {
        EngineRun {
            probe: Arc::new(FeatureProbe::new("iam", path)),
            feature_path: PathBuf::from(path),
            tags: tags.to_string(),
        }
    }

    #[test]
    fn test_outcome_from_exit_code() {
        assert_eq!(EngineOutcome::from_exit_code(0), EngineOutcome::Passed);
        assert_eq!(EngineOutcome::from_exit_code(1), EngineOutcome::Failed);
        assert_eq!(EngineOutcome::from_exit_code(127), EngineOutcome::Errored);
        assert_eq!(EngineOutcome::from_exit_code(-1), EngineOutcome::Errored);
        assert_eq!(EngineOutcome::Failed.status(), ProbeStatus::CompleteFail);
    }

    #[test]
    fn test_argv_includes_tags_only_when_set() {
        let engine = CommandEngine::new(vec!["cucumber".into(), "--strict".into()]);
        assert_eq!(
            engine.argv(&run_for("iam.feature", "~@probes/kubernetes/iam")),
            vec!["cucumber", "--strict", "--tags", "~@probes/kubernetes/iam", "iam.feature"]
        );
        assert_eq!(
            engine.argv(&run_for("iam.feature", "")),
            vec!["cucumber", "--strict", "iam.feature"]
        );
    }

    #[tokio::test]
    async fn test_empty_command_is_execution_failure() {
        let engine = CommandEngine::new(vec![]);
        let err = engine.run(run_for("iam.feature", "")).await.unwrap_err();
        assert!(matches!(err, ProbeError::ExecutionFailure { .. }));
    }

    #[tokio::test]
    async fn test_passing_runner() {
        let engine = CommandEngine::new(vec!["echo".into()]);
        let report = engine.run(run_for("iam.feature", "")).await.unwrap();
        assert_eq!(report.outcome, EngineOutcome::Passed);
        assert!(report.stdout.contains("iam.feature"));
    }

    #[tokio::test]
    async fn test_failing_runner() {
        let engine = CommandEngine::new(vec!["false".into()]);
        let report = engine.run(run_for("iam.feature", "")).await.unwrap();
        assert_eq!(report.outcome, EngineOutcome::Failed);
        assert_eq!(report.exit_code, 1);
    }

    #[tokio::test]
    async fn test_suite_env_reaches_child() {
        let engine = CommandEngine::new(vec![
            "sh".into(),
            "-c".into(),
            "echo probe=$PROBR_PROBE".into(),
            "sh".into(),
        ]);
        let report = engine.run(run_for("iam.feature", "")).await.unwrap();
        assert!(report.stdout.contains("probe=iam"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_execution_failure() {
        let engine = CommandEngine::new(vec!["probr-no-such-runner".into()]);
        let err = engine.run(run_for("iam.feature", "")).await.unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }
}
