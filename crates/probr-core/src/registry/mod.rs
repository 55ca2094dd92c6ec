//! Probe registry: probe capability, lifecycle status and the shared store.

pub mod probe;
pub mod status;
pub mod store;

pub use probe::{FeatureProbe, Probe, ScenarioContext, SuiteContext};
pub use status::{Group, ProbeStatus};
pub use store::{Claim, ProbeDescriptor, ProbeStore, RegistryEntry};
