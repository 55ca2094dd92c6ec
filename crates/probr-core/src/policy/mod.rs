//! Exclusion policy: decides which packs, probes and scenarios are skipped and
//! builds the tag-exclusion expression handed to the test engine.
//!
//! Decisions are evaluated top-down (pack, then probe, then scenario); once a
//! scope is excluded nothing beneath it is consulted.

pub mod exclusion;
pub mod requirements;

use tracing::{info, warn};

use crate::config::ProbrConfig;

pub use exclusion::{
    build_exclusion_expression, cucumber_tags_list_to_string, exclusion_tags, negate_tags,
    pack_excluded, pack_exclusion, probe_excluded, probe_tag, resolve_tags, scenario_excluded,
    scenario_tag, ExclusionReason,
};
pub use requirements::{Requirement, RequirementTable};

/// Configuration-backed exclusion decisions for one run.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    config: ProbrConfig,
    requirements: RequirementTable,
}

impl ExclusionPolicy {
    pub fn new(config: ProbrConfig, requirements: RequirementTable) -> Self {
        Self {
            config,
            requirements,
        }
    }

    /// Policy over `config` with the built-in pack requirements.
    pub fn builtin(config: ProbrConfig) -> Self {
        Self::new(config, RequirementTable::builtin())
    }

    pub fn config(&self) -> &ProbrConfig {
        &self.config
    }

    pub fn requirements(&self) -> &RequirementTable {
        &self.requirements
    }

    pub fn pack(&self, pack: &str) -> Option<ExclusionReason> {
        pack_exclusion(pack, &self.config, &self.requirements)
    }

    /// Pack decision first, then the probe's own justification.
    pub fn probe(&self, pack: &str, probe: &str) -> Option<ExclusionReason> {
        if let Some(reason) = self.pack(pack) {
            return Some(reason);
        }
        let probe_cfg = self.config.service_packs.probe(pack, probe)?;
        probe_excluded(probe_cfg).then(|| ExclusionReason::Justified {
            scope: format!("probe '{probe}'"),
            justification: probe_cfg.excluded.clone(),
        })
    }

    pub fn scenario(&self, pack: &str, probe: &str, scenario: &str) -> Option<ExclusionReason> {
        if let Some(reason) = self.probe(pack, probe) {
            return Some(reason);
        }
        let scenario_cfg = self
            .config
            .service_packs
            .probe(pack, probe)?
            .scenario(scenario)?;
        scenario_excluded(scenario_cfg).then(|| ExclusionReason::Justified {
            scope: format!("scenario '{scenario}'"),
            justification: scenario_cfg.excluded.clone(),
        })
    }

    /// Exclusion expression from configuration: probe and scenario exclusions
    /// of every pack that is not excluded as a whole, plus `TagExclusions`.
    pub fn tag_expression(&self) -> String {
        let packs = self
            .config
            .service_packs
            .iter()
            .filter(|(pack, _)| self.pack(pack).is_none());
        let mut tags = exclusion_tags(packs);
        tags.extend(self.config.tag_exclusions.iter().cloned());
        negate_tags(&tags)
    }

    /// Tags handed to the engine: the explicit `Tags` value if set, otherwise
    /// the configuration exclusion expression.
    pub fn effective_tags(&self) -> String {
        resolve_tags(&self.config.tags, &self.tag_expression())
    }

    /// Log a pack decision. Missing prerequisites warn only when the pack may
    /// have been expected to run.
    pub fn log_pack_decision(&self, pack: &str) -> Option<ExclusionReason> {
        let reason = self.pack(pack);
        match &reason {
            Some(r @ ExclusionReason::MissingRequirement { .. }) => {
                let run_only = &self.config.meta.run_only;
                if run_only.is_empty() || run_only.eq_ignore_ascii_case(pack) {
                    warn!(pack = %pack, "ignoring service pack: {}", r);
                } else {
                    info!(pack = %pack, "ignoring service pack: {}", r);
                }
            }
            Some(r) => info!(pack = %pack, "ignoring service pack: {}", r),
            None => info!(pack = %pack, "service pack included"),
        }
        reason
    }
}
