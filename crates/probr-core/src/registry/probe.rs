//! The probe capability supplied by pack authors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// State handed to a probe's suite initializer, once per run of its feature.
#[derive(Debug, Clone, Default)]
pub struct SuiteContext {
    pub probe: String,
    pub feature_path: PathBuf,
    /// Tag filter the engine will apply.
    pub tags: String,
    /// Extra environment for out-of-process engines.
    pub env: BTreeMap<String, String>,
}

impl SuiteContext {
    pub fn new(probe: &str, feature_path: &Path, tags: &str) -> Self {
        Self {
            probe: probe.to_string(),
            feature_path: feature_path.to_path_buf(),
            tags: tags.to_string(),
            env: BTreeMap::new(),
        }
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }
}

/// State handed to a probe's scenario initializer before each scenario.
#[derive(Debug, Clone, Default)]
pub struct ScenarioContext {
    pub probe: String,
    pub scenario: String,
    pub tags: Vec<String>,
    pub values: BTreeMap<String, serde_json::Value>,
}

impl ScenarioContext {
    pub fn new(probe: &str, scenario: &str, tags: Vec<String>) -> Self {
        Self {
            probe: probe.to_string(),
            scenario: scenario.to_string(),
            tags,
            values: BTreeMap::new(),
        }
    }
}

/// A named compliance test suite bound to a feature file.
///
/// The registry keeps a shared handle; the probe's own lifecycle belongs to the
/// code that created it.
pub trait Probe: Send + Sync {
    /// Unique name within a store.
    fn name(&self) -> &str;

    /// Location of the feature file handed to the test engine.
    fn feature_path(&self) -> PathBuf;

    /// Invoked once before any scenario of this probe runs.
    fn initialize(&self, _suite: &mut SuiteContext) {}

    /// Invoked before each scenario.
    fn initialize_scenario(&self, _scenario: &mut ScenarioContext) {}
}

/// A probe backed by a feature file on disk with no custom hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureProbe {
    name: String,
    path: PathBuf,
}

impl FeatureProbe {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Discover `<features_dir>/<pack>/*.feature`, one probe per file, named by
    /// file stem and sorted by name. A missing pack directory yields no probes.
    pub fn discover(features_dir: &Path, pack: &str) -> std::io::Result<Vec<FeatureProbe>> {
        let dir = features_dir.join(pack);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut probes = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("feature") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                probes.push(FeatureProbe::new(stem, path.clone()));
            }
        }
        probes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(probes)
    }
}

impl Probe for FeatureProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_path(&self) -> PathBuf {
        self.path.clone()
    }

    fn initialize(&self, suite: &mut SuiteContext) {
        suite.set_env("PROBR_PROBE", self.name.clone());
    }
}
