//! In-memory fakes for the engine, evaluator and cloud seams (testing only)
//!
//! Provides `ScriptedEngine`, `RecordingProbe`, `StaticEvaluator`, and
//! `MemoryAzureApi` that satisfy the trait contracts without spawning
//! processes or reaching a cloud.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::cloud::{AzureApi, ResourceGroup, StorageAccount, StorageAccountRequest};
use crate::engine::{EngineOutcome, EngineReport, EngineRun, TestEngine};
use crate::error::{ProbeError, ProbeResult};
use crate::opa::PolicyEvaluator;
use crate::registry::{Probe, ScenarioContext, SuiteContext};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// ScriptedEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Script {
    Outcome(EngineOutcome),
    Failure(String),
}

/// Engine returning a scripted outcome per probe name (default `Passed`).
///
/// Runs the suite hook once and the scenario hook once per configured
/// scenario name, and counts invocations per probe.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    scripts: HashMap<String, Script>,
    scenarios: Vec<String>,
    calls: Mutex<HashMap<String, usize>>,
    tags: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, probe: &str, outcome: EngineOutcome) -> Self {
        self.scripts
            .insert(probe.to_string(), Script::Outcome(outcome));
        self
    }

    /// The engine cannot be driven for `probe`.
    pub fn with_failure(mut self, probe: &str, reason: &str) -> Self {
        self.scripts
            .insert(probe.to_string(), Script::Failure(reason.to_string()));
        self
    }

    pub fn with_scenarios(mut self, names: &[&str]) -> Self {
        self.scenarios = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn calls(&self, probe: &str) -> usize {
        lock(&self.calls).get(probe).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    /// Tag expressions received, in call order.
    pub fn tags_seen(&self) -> Vec<String> {
        lock(&self.tags).clone()
    }
}

#[async_trait]
impl TestEngine for ScriptedEngine {
    async fn run(&self, run: EngineRun) -> ProbeResult<EngineReport> {
        let name = run.probe.name().to_string();
        *lock(&self.calls).entry(name.clone()).or_insert(0) += 1;
        lock(&self.tags).push(run.tags.clone());

        let outcome = match self.scripts.get(&name) {
            Some(Script::Failure(reason)) => {
                return Err(ProbeError::ExecutionFailure {
                    probe: name,
                    reason: reason.clone(),
                })
            }
            Some(Script::Outcome(outcome)) => *outcome,
            None => EngineOutcome::Passed,
        };

        let mut suite = SuiteContext::new(&name, &run.feature_path, &run.tags);
        run.probe.initialize(&mut suite);
        for scenario in &self.scenarios {
            let mut ctx = ScenarioContext::new(&name, scenario, Vec::new());
            run.probe.initialize_scenario(&mut ctx);
        }

        Ok(EngineReport::from_outcome(outcome))
    }
}

// ---------------------------------------------------------------------------
// RecordingProbe
// ---------------------------------------------------------------------------

/// Probe counting how often its hooks run.
#[derive(Debug)]
pub struct RecordingProbe {
    name: String,
    path: PathBuf,
    suite_calls: AtomicUsize,
    scenario_calls: AtomicUsize,
}

impl RecordingProbe {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            suite_calls: AtomicUsize::new(0),
            scenario_calls: AtomicUsize::new(0),
        }
    }

    pub fn suite_calls(&self) -> usize {
        self.suite_calls.load(Ordering::SeqCst)
    }

    pub fn scenario_calls(&self) -> usize {
        self.scenario_calls.load(Ordering::SeqCst)
    }
}

impl Probe for RecordingProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_path(&self) -> PathBuf {
        self.path.clone()
    }

    fn initialize(&self, _suite: &mut SuiteContext) {
        self.suite_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn initialize_scenario(&self, _scenario: &mut ScenarioContext) {
        self.scenario_calls.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// StaticEvaluator
// ---------------------------------------------------------------------------

/// Evaluator binding every query to the same value.
#[derive(Debug)]
pub struct StaticEvaluator {
    value: Value,
    queries: Mutex<Vec<String>>,
}

impl StaticEvaluator {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl PolicyEvaluator for StaticEvaluator {
    async fn evaluate(&self, _rule_file: &Path, query: &str, _input: &Value) -> ProbeResult<Value> {
        lock(&self.queries).push(query.to_string());
        Ok(self.value.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryAzureApi
// ---------------------------------------------------------------------------

/// Azure API backed by in-memory maps keyed by `(resource group, name)`.
#[derive(Debug, Default)]
pub struct MemoryAzureApi {
    groups: Mutex<HashMap<String, ResourceGroup>>,
    accounts: Mutex<HashMap<(String, String), StorageAccount>>,
    clusters: Mutex<HashMap<(String, String), Value>>,
    disks: Mutex<HashMap<(String, String), Value>>,
}

impl MemoryAzureApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_group(&self, group: ResourceGroup) {
        lock(&self.groups).insert(group.name.clone(), group);
    }

    pub fn insert_cluster(&self, resource_group: &str, cluster: &str, doc: Value) {
        lock(&self.clusters).insert(key(resource_group, cluster), doc);
    }

    pub fn insert_disk(&self, resource_group: &str, disk: &str, doc: Value) {
        lock(&self.disks).insert(key(resource_group, disk), doc);
    }

    pub fn account_count(&self) -> usize {
        lock(&self.accounts).len()
    }
}

fn key(resource_group: &str, name: &str) -> (String, String) {
    (resource_group.to_string(), name.to_string())
}

fn missing(kind: &str, name: &str) -> ProbeError {
    ProbeError::CloudUnavailable(format!("{kind} '{name}' not found"))
}

#[async_trait]
impl AzureApi for MemoryAzureApi {
    async fn resource_group(&self, name: &str) -> ProbeResult<ResourceGroup> {
        lock(&self.groups)
            .get(name)
            .cloned()
            .ok_or_else(|| missing("resource group", name))
    }

    async fn create_storage_account(
        &self,
        request: &StorageAccountRequest,
    ) -> ProbeResult<StorageAccount> {
        let location = self.resource_group(&request.resource_group).await?.location;
        let account = StorageAccount {
            name: request.name.clone(),
            resource_group: request.resource_group.clone(),
            location,
            https_only: request.https_only,
        };
        lock(&self.accounts).insert(key(&request.resource_group, &request.name), account.clone());
        Ok(account)
    }

    async fn delete_storage_account(&self, resource_group: &str, account: &str) -> ProbeResult<()> {
        lock(&self.accounts)
            .remove(&key(resource_group, account))
            .map(|_| ())
            .ok_or_else(|| missing("storage account", account))
    }

    async fn managed_cluster_json(&self, resource_group: &str, cluster: &str) -> ProbeResult<Value> {
        lock(&self.clusters)
            .get(&key(resource_group, cluster))
            .cloned()
            .ok_or_else(|| missing("managed cluster", cluster))
    }

    async fn disk_json(&self, resource_group: &str, disk: &str) -> ProbeResult<Value> {
        lock(&self.disks)
            .get(&key(resource_group, disk))
            .cloned()
            .ok_or_else(|| missing("disk", disk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_azure_storage_account_lifecycle() {
        let api = MemoryAzureApi::new();
        api.insert_group(ResourceGroup {
            name: "probr-rg".into(),
            location: "eastus2".into(),
            ..ResourceGroup::default()
        });

        let request = StorageAccountRequest {
            name: "probrsa".into(),
            resource_group: "probr-rg".into(),
            https_only: true,
            ..StorageAccountRequest::default()
        };
        let account = api.create_storage_account(&request).await.unwrap();
        assert_eq!(account.location, "eastus2");
        assert_eq!(api.account_count(), 1);

        api.delete_storage_account("probr-rg", "probrsa").await.unwrap();
        assert!(api.delete_storage_account("probr-rg", "probrsa").await.is_err());
    }

    #[tokio::test]
    async fn test_storage_account_needs_existing_group() {
        let api = MemoryAzureApi::new();
        let request = StorageAccountRequest {
            name: "probrsa".into(),
            resource_group: "nope".into(),
            ..StorageAccountRequest::default()
        };
        assert!(api.create_storage_account(&request).await.is_err());
    }
}
