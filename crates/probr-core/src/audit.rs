//! Audit sinks receiving per-probe status, metadata and completion records.
//!
//! Sinks must tolerate repeated and out-of-order writes for the same probe:
//! the latest status wins and metadata keys are overwritten.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::registry::ProbeStatus;

/// Write-only audit destination.
pub trait AuditSink: Send + Sync {
    /// Record the latest status string for a probe.
    fn record_status(&self, probe: &str, status: ProbeStatus);

    /// Attach a metadata key/value to a probe.
    fn record_meta(&self, probe: &str, key: &str, value: &str);

    /// Mark a probe's execution as complete.
    fn probe_complete(&self, probe: &str);
}

/// Accumulated audit state for one probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeAudit {
    pub name: String,
    pub result: String,
    pub meta: BTreeMap<String, String>,
    pub completions: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

/// In-memory audit sink.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    probes: Mutex<HashMap<String, ProbeAudit>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<R>(&self, probe: &str, f: impl FnOnce(&mut ProbeAudit) -> R) -> R {
        let mut probes = self.probes.lock().unwrap_or_else(PoisonError::into_inner);
        let record = probes
            .entry(probe.to_string())
            .or_insert_with(|| ProbeAudit {
                name: probe.to_string(),
                ..ProbeAudit::default()
            });
        f(record)
    }

    /// Copy of a probe's audit record.
    pub fn probe(&self, probe: &str) -> Option<ProbeAudit> {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(probe)
            .cloned()
    }

    /// All records, ordered by probe name.
    pub fn records(&self) -> Vec<ProbeAudit> {
        let probes = self.probes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records: Vec<ProbeAudit> = probes.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_status(&self, probe: &str, status: ProbeStatus) {
        self.update(probe, |r| r.result = status.to_string());
    }

    fn record_meta(&self, probe: &str, key: &str, value: &str) {
        self.update(probe, |r| {
            r.meta.insert(key.to_string(), value.to_string());
        });
    }

    fn probe_complete(&self, probe: &str) {
        self.update(probe, |r| {
            r.completions += 1;
            r.completed_at = Some(Utc::now());
        });
    }
}

/// Audit sink that writes one JSON document per completed probe.
///
/// With `overwrite` disabled every completion gets a timestamped file so
/// historical audits are kept.
#[derive(Debug)]
pub struct FsAuditSink {
    dir: PathBuf,
    overwrite: bool,
    state: MemoryAuditSink,
}

impl FsAuditSink {
    pub fn new(dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            dir: dir.into(),
            overwrite,
            state: MemoryAuditSink::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, record: &ProbeAudit) -> PathBuf {
        if self.overwrite {
            return self.dir.join(format!("{}.json", record.name));
        }
        let stamp = record
            .completed_at
            .unwrap_or_else(Utc::now)
            .format("%Y%m%dT%H%M%S%3f");
        self.dir.join(format!("{}-{}.json", record.name, stamp))
    }

    fn persist(&self, record: &ProbeAudit) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_for(record);
        let json = serde_json::to_vec_pretty(record).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

impl AuditSink for FsAuditSink {
    fn record_status(&self, probe: &str, status: ProbeStatus) {
        self.state.record_status(probe, status);
    }

    fn record_meta(&self, probe: &str, key: &str, value: &str) {
        self.state.record_meta(probe, key, value);
    }

    fn probe_complete(&self, probe: &str) {
        self.state.probe_complete(probe);
        let Some(record) = self.state.probe(probe) else {
            return;
        };
        match self.persist(&record) {
            Ok(path) => debug!(probe = %probe, path = %path.display(), "audit written"),
            Err(e) => warn!(probe = %probe, error = %e, "failed to write audit"),
        }
    }
}
