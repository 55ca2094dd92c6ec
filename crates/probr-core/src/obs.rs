//! Structured observability hooks for the probe lifecycle.
//!
//! - A batch-scoped tracing span from [`run_span`], attached to the batch
//!   future with `tracing::Instrument`
//! - Emission functions for registration, exclusion, start, finish and batch
//!   completion
//!
//! Events are emitted at `info!` level except failures, which use `error!` so
//! each failing probe produces exactly one error line.

use tracing::{error, info};

use crate::registry::ProbeStatus;

/// Span tagging every event of one batch with its run id.
///
/// ```ignore
/// orchestrator.run_batch(run_id.clone()).instrument(run_span(&run_id)).await
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("probr.run", run_id = %run_id)
}

pub fn emit_probe_registered(pack: &str, probe: &str) {
    info!(event = "probe.registered", pack = %pack, probe = %probe);
}

pub fn emit_probe_excluded(probe: &str, reason: &dyn std::fmt::Display) {
    info!(event = "probe.excluded", probe = %probe, reason = %reason);
}

pub fn emit_probe_started(probe: &str, feature_path: &str, tags: &str) {
    info!(
        event = "probe.started",
        probe = %probe,
        feature_path = %feature_path,
        tags = %tags,
    );
}

/// Emit event: probe settled. Failures are logged at error level.
pub fn emit_probe_finished(probe: &str, status: ProbeStatus, duration_ms: u64) {
    match status {
        ProbeStatus::CompleteFail | ProbeStatus::Error => error!(
            event = "probe.finished",
            probe = %probe,
            status = %status,
            duration_ms = duration_ms,
        ),
        _ => info!(
            event = "probe.finished",
            probe = %probe,
            status = %status,
            duration_ms = duration_ms,
        ),
    }
}

pub fn emit_probe_error(probe: &str, err: &dyn std::fmt::Display) {
    error!(event = "probe.error", probe = %probe, error = %err);
}

pub fn emit_batch_finished(run_id: &str, total: usize, exit_code: i32, duration_ms: u64) {
    info!(
        event = "batch.finished",
        run_id = %run_id,
        total = total,
        exit_code = exit_code,
        duration_ms = duration_ms,
    );
}
