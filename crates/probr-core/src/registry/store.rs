//! Concurrency-safe probe store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::audit::AuditSink;
use crate::error::{ProbeError, ProbeResult};
use crate::obs;

use super::probe::Probe;
use super::status::{Group, ProbeStatus};

/// Identity of a registered probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeDescriptor {
    pub group: Group,
    pub name: String,
}

/// Snapshot of a registry entry.
///
/// The status is the value at the time the snapshot was taken; re-fetch via
/// [`ProbeStore::get`] or [`ProbeStore::status`] after any mutation point.
#[derive(Clone)]
pub struct RegistryEntry {
    descriptor: ProbeDescriptor,
    pack: String,
    feature_path: PathBuf,
    probe: Arc<dyn Probe>,
    status: ProbeStatus,
}

impl RegistryEntry {
    pub fn descriptor(&self) -> &ProbeDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn group(&self) -> Group {
        self.descriptor.group
    }

    /// Name of the store (pack) the probe was registered in.
    pub fn pack(&self) -> &str {
        &self.pack
    }

    pub fn feature_path(&self) -> &PathBuf {
        &self.feature_path
    }

    /// Handle to the probe's initializer hooks.
    pub fn probe(&self) -> Arc<dyn Probe> {
        Arc::clone(&self.probe)
    }

    pub fn status(&self) -> ProbeStatus {
        self.status
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("descriptor", &self.descriptor)
            .field("pack", &self.pack)
            .field("feature_path", &self.feature_path)
            .field("status", &self.status)
            .finish()
    }
}

/// Outcome of trying to start a probe.
#[derive(Debug, Clone)]
pub enum Claim {
    /// The entry moved `Pending -> Running`; the caller now owns its execution.
    Started(RegistryEntry),
    /// The entry had already settled; nothing changed.
    Settled(ProbeStatus),
}

/// Probes to be run for one pack, and their status.
///
/// Write-once per name: registering an existing name is rejected. Statuses are
/// updated in place under the write lock; reads take the read lock. No call
/// into a probe or engine happens while the lock is held.
pub struct ProbeStore {
    name: String,
    group: Group,
    entries: RwLock<HashMap<String, RegistryEntry>>,
    audit: Arc<dyn AuditSink>,
}

impl ProbeStore {
    pub fn new(name: impl Into<String>, group: Group, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            name: name.into(),
            group,
            entries: RwLock::new(HashMap::new()),
            audit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn audit(&self) -> Arc<dyn AuditSink> {
        Arc::clone(&self.audit)
    }

    // Entries are plain data, so a panic in another holder cannot leave them
    // half-written; recover the guard instead of propagating poison.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RegistryEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RegistryEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a probe with status `Pending`.
    pub fn register(&self, probe: Arc<dyn Probe>) -> ProbeResult<ProbeDescriptor> {
        let name = probe.name().to_string();
        let descriptor = ProbeDescriptor {
            group: self.group,
            name: name.clone(),
        };

        {
            let mut entries = self.write();
            if entries.contains_key(&name) {
                return Err(ProbeError::DuplicateRegistration(name));
            }
            entries.insert(
                name.clone(),
                RegistryEntry {
                    descriptor: descriptor.clone(),
                    pack: self.name.clone(),
                    feature_path: probe.feature_path(),
                    probe,
                    status: ProbeStatus::Pending,
                },
            );
        }

        self.audit.record_status(&name, ProbeStatus::Pending);
        self.audit.record_meta(&name, "group", self.group.as_str());
        self.audit.record_meta(&name, "pack", &self.name);
        obs::emit_probe_registered(&self.name, &name);

        Ok(descriptor)
    }

    pub fn get(&self, name: &str) -> ProbeResult<RegistryEntry> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| ProbeError::NotFound(name.to_string()))
    }

    /// Current status of a probe.
    pub fn status(&self, name: &str) -> ProbeResult<ProbeStatus> {
        self.read()
            .get(name)
            .map(|e| e.status)
            .ok_or_else(|| ProbeError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Point-in-time copy of every entry, ordered by name.
    pub fn enumerate(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<RegistryEntry> = self.read().values().cloned().collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }

    /// Probe names, ordered.
    pub fn names(&self) -> Vec<String> {
        self.enumerate()
            .into_iter()
            .map(|e| e.descriptor.name)
            .collect()
    }

    /// Move a probe to `to`, returning the previous status.
    pub fn transition(&self, name: &str, to: ProbeStatus) -> ProbeResult<ProbeStatus> {
        let from = {
            let mut entries = self.write();
            let entry = entries
                .get_mut(name)
                .ok_or_else(|| ProbeError::NotFound(name.to_string()))?;
            let from = entry.status;
            if !from.can_transition_to(to) {
                return Err(ProbeError::InvalidTransition {
                    probe: name.to_string(),
                    from,
                    to,
                });
            }
            entry.status = to;
            from
        };

        debug!(probe = %name, from = %from, to = %to, "probe status changed");
        self.audit.record_status(name, to);
        Ok(from)
    }

    /// Atomically claim a pending probe for execution.
    ///
    /// A settled probe is returned as [`Claim::Settled`] untouched. A probe
    /// that is already running belongs to another caller and is rejected.
    pub fn claim(&self, name: &str) -> ProbeResult<Claim> {
        let claimed = {
            let mut entries = self.write();
            let entry = entries
                .get_mut(name)
                .ok_or_else(|| ProbeError::NotFound(name.to_string()))?;
            match entry.status {
                ProbeStatus::Pending => {
                    entry.status = ProbeStatus::Running;
                    entry.clone()
                }
                ProbeStatus::Running => {
                    return Err(ProbeError::InvalidTransition {
                        probe: name.to_string(),
                        from: ProbeStatus::Running,
                        to: ProbeStatus::Running,
                    })
                }
                settled => return Ok(Claim::Settled(settled)),
            }
        };

        self.audit.record_status(name, ProbeStatus::Running);
        Ok(Claim::Started(claimed))
    }
}

impl std::fmt::Debug for ProbeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeStore")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("entries", &self.len())
            .finish()
    }
}
