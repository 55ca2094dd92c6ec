//! Probe execution orchestration.
//!
//! An [`Orchestrator`] drives the probes of one store through the engine,
//! one at a time, and folds their statuses into a process exit code.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::engine::{EngineRun, TestEngine};
use crate::error::{ProbeError, ProbeResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::policy::ExclusionPolicy;
use crate::registry::{Claim, Probe, ProbeDescriptor, ProbeStatus, ProbeStore};

/// Settled state of one probe after a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub probe: String,
    pub status: ProbeStatus,
    pub exit_code: i32,
}

/// Result of executing every probe in a store.
#[derive(Debug)]
pub struct BatchReport {
    pub run_id: String,
    /// Highest exit code of any probe.
    pub exit_code: i32,
    pub results: Vec<ProbeOutcome>,
    /// Last error raised by any probe; earlier ones are only logged.
    pub last_error: Option<ProbeError>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn passed_count(&self) -> usize {
        self.count(ProbeStatus::CompleteSuccess)
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ProbeStatus::CompleteFail | ProbeStatus::Error))
            .count()
    }

    pub fn excluded_count(&self) -> usize {
        self.count(ProbeStatus::Excluded)
    }

    fn count(&self, status: ProbeStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Runs the probes of a single pack store.
pub struct Orchestrator {
    store: Arc<ProbeStore>,
    engine: Arc<dyn TestEngine>,
    policy: Arc<ExclusionPolicy>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ProbeStore>,
        engine: Arc<dyn TestEngine>,
        policy: Arc<ExclusionPolicy>,
    ) -> Self {
        Self {
            store,
            engine,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<ProbeStore> {
        &self.store
    }

    pub fn policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    /// Register a probe and immediately apply its exclusion decision.
    pub fn register(&self, probe: Arc<dyn Probe>) -> ProbeResult<ProbeDescriptor> {
        let descriptor = self.store.register(probe)?;
        self.exclude_if_configured(&descriptor.name)?;
        Ok(descriptor)
    }

    /// Mark every pending probe the policy excludes as `Excluded`.
    ///
    /// Returns the number of probes newly excluded.
    pub fn apply_exclusions(&self) -> ProbeResult<usize> {
        let mut excluded = 0;
        for entry in self.store.enumerate() {
            if entry.status() == ProbeStatus::Pending && self.exclude_if_configured(entry.name())? {
                excluded += 1;
            }
        }
        Ok(excluded)
    }

    fn exclude_if_configured(&self, name: &str) -> ProbeResult<bool> {
        let Some(reason) = self.policy.probe(self.store.name(), name) else {
            return Ok(false);
        };
        self.store.transition(name, ProbeStatus::Excluded)?;
        self.store
            .audit()
            .record_meta(name, "excluded", &reason.to_string());
        obs::emit_probe_excluded(name, &reason);
        METRICS.inc_excluded();
        Ok(true)
    }

    /// Execute one probe by name and return its exit code.
    ///
    /// An excluded probe yields 0 without touching the engine, as does any
    /// probe that has already settled (its recorded exit code is returned). An
    /// engine that cannot be driven leaves the probe in `Error` and returns the
    /// engine's error.
    pub async fn execute_one(&self, name: &str) -> ProbeResult<i32> {
        if self.store.status(name)? == ProbeStatus::Pending && self.exclude_if_configured(name)? {
            return Ok(0);
        }

        let entry = match self.store.claim(name)? {
            Claim::Settled(status) => {
                debug!(probe = %name, status = %status, "probe already settled");
                return Ok(status.exit_code().unwrap_or(1));
            }
            Claim::Started(entry) => entry,
        };

        let tags = self.policy.effective_tags();
        obs::emit_probe_started(name, &entry.feature_path().display().to_string(), &tags);
        METRICS.inc_executed();

        let start = Instant::now();
        let run = EngineRun {
            probe: entry.probe(),
            feature_path: entry.feature_path().clone(),
            tags,
        };
        let result = self.engine.run(run).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(report) => {
                let status = report.outcome.status();
                self.store.transition(name, status)?;
                self.store
                    .audit()
                    .record_meta(name, "exit_code", &report.exit_code.to_string());
                if status != ProbeStatus::CompleteSuccess {
                    METRICS.inc_failed();
                }
                obs::emit_probe_finished(name, status, duration_ms);
                Ok(status.exit_code().unwrap_or(1))
            }
            Err(err) => {
                self.store.transition(name, ProbeStatus::Error)?;
                self.store.audit().record_meta(name, "error", &err.to_string());
                METRICS.inc_failed();
                obs::emit_probe_error(name, &err);
                Err(err)
            }
        }
    }

    /// Execute every probe in the store sequentially.
    ///
    /// Failures never stop the batch. The exit code is the maximum over all
    /// probes; a probe whose execution errored counts as 1.
    pub async fn execute_all(&self) -> BatchReport {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.run_batch(run_id).instrument(span).await
    }

    async fn run_batch(&self, run_id: String) -> BatchReport {
        let start = Instant::now();
        let mut last_error = None;
        let mut exit_code = 0;
        let mut results = Vec::new();

        if let Err(err) = self.apply_exclusions() {
            obs::emit_probe_error(self.store.name(), &err);
            last_error = Some(err);
        }

        let audit = self.store.audit();
        for name in self.store.names() {
            let code = match self.execute_one(&name).await {
                Ok(code) => code,
                Err(err) => {
                    last_error = Some(err);
                    1
                }
            };
            audit.probe_complete(&name);

            if let Ok(status) = self.store.status(&name) {
                results.push(ProbeOutcome {
                    probe: name,
                    status,
                    exit_code: code,
                });
            }
            exit_code = exit_code.max(code);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_batch_finished(&run_id, results.len(), exit_code, duration_ms);
        METRICS.flush();

        BatchReport {
            run_id,
            exit_code,
            results,
            last_error,
            duration_ms,
        }
    }
}
