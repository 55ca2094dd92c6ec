//! Probr Core Library
//!
//! Probe registry, exclusion policy and execution orchestration for
//! compliance probes run through an external BDD engine.

pub mod audit;
pub mod cloud;
pub mod config;
pub mod engine;
pub mod error;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod opa;
pub mod orchestrator;
pub mod policy;
pub mod registry;
pub mod telemetry;

pub use audit::{AuditSink, FsAuditSink, MemoryAuditSink, ProbeAudit};
pub use cloud::{
    disk_json_by_uri, parse_disk_uri, AzureApi, AzureCredentials, CloudConnection, DiskRef,
    ResourceGroup, StorageAccount, StorageAccountRequest,
};
pub use config::{EngineConfig, Meta, ProbrConfig};
pub use engine::{CommandEngine, EngineOutcome, EngineReport, EngineRun, TestEngine};
pub use error::{ConfigError, ProbeError, ProbeResult};
pub use opa::{evaluate_rule, OpaCommandEvaluator, PolicyEvaluator};
pub use orchestrator::{BatchReport, Orchestrator, ProbeOutcome};
pub use policy::{ExclusionPolicy, ExclusionReason, RequirementTable};
pub use registry::{
    Claim, FeatureProbe, Group, Probe, ProbeDescriptor, ProbeStatus, ProbeStore, RegistryEntry,
    ScenarioContext, SuiteContext,
};
pub use metrics::METRICS;
pub use obs::{
    emit_batch_finished, emit_probe_error, emit_probe_excluded, emit_probe_finished,
    emit_probe_registered, emit_probe_started, run_span,
};
pub use telemetry::{init_tracing, parse_log_level};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
