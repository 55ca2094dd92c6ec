//! Observability tests for the probe lifecycle events.

use probr_core::policy::ExclusionReason;
use probr_core::{
    emit_batch_finished, emit_probe_error, emit_probe_excluded, emit_probe_finished,
    emit_probe_registered, emit_probe_started, parse_log_level, run_span,
    ExclusionPolicy, ProbeStatus, ProbrConfig, METRICS,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_probe_registered_logs_pack_and_probe() {
    emit_probe_registered("kubernetes", "pod_security");
    assert!(logs_contain("probe.registered"));
    assert!(logs_contain("pod_security"));
}

#[traced_test]
#[test]
fn test_emit_probe_excluded_logs_reason() {
    let reason = ExclusionReason::Justified {
        scope: "probe 'iam'".into(),
        justification: "no pod identity".into(),
    };
    emit_probe_excluded("iam", &reason);
    assert!(logs_contain("no pod identity"));
}

#[traced_test]
#[test]
fn test_emit_probe_started_logs_tags() {
    emit_probe_started("iam", "features/kubernetes/iam.feature", "~@probes/kubernetes/psp");
    assert!(logs_contain("probe.started"));
    assert!(logs_contain("~@probes/kubernetes/psp"));
}

#[traced_test]
#[test]
fn test_failed_probe_logs_at_error_level() {
    emit_probe_finished("iam", ProbeStatus::CompleteFail, 12);
    assert!(logs_contain("ERROR"));
    assert!(logs_contain("CompleteFail"));
}

#[traced_test]
#[test]
fn test_passed_probe_logs_at_info_level() {
    emit_probe_finished("iam", ProbeStatus::CompleteSuccess, 12);
    assert!(logs_contain("INFO"));
    assert!(!logs_contain("ERROR"));
}

#[traced_test]
#[test]
fn test_emit_probe_error_logs_error() {
    emit_probe_error("iam", &"runner missing");
    assert!(logs_contain("probe.error"));
    assert!(logs_contain("runner missing"));
}

#[traced_test]
#[test]
fn test_batch_events_carry_run_id() {
    let _guard = run_span("run-abc").entered();
    emit_batch_finished("run-abc", 3, 1, 40);
    assert!(logs_contain("batch.finished"));
    assert!(logs_contain("run-abc"));
}

#[traced_test]
#[test]
fn test_missing_requirement_warns_when_pack_expected() {
    let policy = ExclusionPolicy::builtin(ProbrConfig::default());
    policy.log_pack_decision("storage");
    assert!(logs_contain("WARN"));
    assert!(logs_contain("ignoring service pack"));
}

#[traced_test]
#[test]
fn test_missing_requirement_is_quiet_for_other_run_only() {
    let mut config = ProbrConfig::default();
    config.meta.run_only = "kubernetes".into();
    let policy = ExclusionPolicy::builtin(config);
    policy.log_pack_decision("storage");
    assert!(!logs_contain("WARN"));
    assert!(logs_contain("ignoring service pack"));
}

#[test]
fn test_metrics_flush_does_not_panic() {
    METRICS.flush();
}

#[test]
fn test_log_level_mapping() {
    assert_eq!(parse_log_level("NOTICE"), tracing::Level::INFO);
    assert_eq!(parse_log_level("bogus"), tracing::Level::ERROR);
}
