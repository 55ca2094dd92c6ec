//! Pure exclusion predicates and tag-expression building.
//!
//! Nothing here logs; callers decide how loudly to report a decision.

use crate::config::{ProbeConfig, ProbrConfig, ScenarioConfig};

use super::requirements::RequirementTable;

/// Tag prefix for probe and scenario exclusion tags.
pub const PROBE_TAG_PREFIX: &str = "probes";

/// Why a pack, probe or scenario is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// A field the pack depends on is unset.
    MissingRequirement { pack: String, field: String },
    /// Another pack was selected with RunOnly.
    NotRunOnly { pack: String, run_only: String },
    /// Excluded in configuration with a justification.
    Justified { scope: String, justification: String },
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::MissingRequirement { pack, field } => {
                write!(f, "{pack} pack requires '{field}' which is not set")
            }
            ExclusionReason::NotRunOnly { pack, run_only } => {
                write!(f, "{pack} pack ignored because only '{run_only}' was requested")
            }
            ExclusionReason::Justified {
                scope,
                justification,
            } => write!(f, "{scope} excluded: {justification}"),
        }
    }
}

/// Whether `pack` must be skipped, and why.
///
/// A missing requirement wins over RunOnly: such a pack is excluded whatever
/// RunOnly says.
pub fn pack_exclusion(
    pack: &str,
    config: &ProbrConfig,
    requirements: &RequirementTable,
) -> Option<ExclusionReason> {
    if let Some(field) = requirements.first_missing(pack, config) {
        return Some(ExclusionReason::MissingRequirement {
            pack: pack.to_string(),
            field: field.to_string(),
        });
    }

    let run_only = &config.meta.run_only;
    if !run_only.is_empty() && !run_only.eq_ignore_ascii_case(pack) {
        return Some(ExclusionReason::NotRunOnly {
            pack: pack.to_string(),
            run_only: run_only.clone(),
        });
    }
    None
}

pub fn pack_excluded(pack: &str, config: &ProbrConfig, requirements: &RequirementTable) -> bool {
    pack_exclusion(pack, config, requirements).is_some()
}

pub fn probe_excluded(probe: &ProbeConfig) -> bool {
    !probe.excluded.is_empty()
}

pub fn scenario_excluded(scenario: &ScenarioConfig) -> bool {
    !scenario.excluded.is_empty()
}

/// `probes/<pack>/<probe>`
pub fn probe_tag(pack: &str, probe: &str) -> String {
    format!("{PROBE_TAG_PREFIX}/{pack}/{probe}")
}

/// `probes/<pack>/<probe>/<scenario>`
pub fn scenario_tag(pack: &str, probe: &str, scenario: &str) -> String {
    format!("{PROBE_TAG_PREFIX}/{pack}/{probe}/{scenario}")
}

/// Exclusion tags for every excluded probe and, within non-excluded probes,
/// every excluded scenario.
pub fn exclusion_tags<'p, 'a>(
    packs: impl IntoIterator<Item = (&'p str, &'a [ProbeConfig])>,
) -> Vec<String> {
    let mut tags = Vec::new();
    for (pack, probes) in packs {
        for probe in probes {
            if probe_excluded(probe) {
                tags.push(probe_tag(pack, &probe.name));
                continue;
            }
            for scenario in probe.scenarios.iter().filter(|s| scenario_excluded(s)) {
                tags.push(scenario_tag(pack, &probe.name, &scenario.name));
            }
        }
    }
    tags
}

/// Join tags into `~@a && ~@b`. Leading `@` or `~@` on a tag is tolerated.
pub fn negate_tags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .map(|t| {
            let t = t.as_ref().trim();
            let bare = t.trim_start_matches('~').trim_start_matches('@');
            format!("~@{bare}")
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Tag-exclusion expression for the given packs.
pub fn build_exclusion_expression<'p, 'a>(
    packs: impl IntoIterator<Item = (&'p str, &'a [ProbeConfig])>,
) -> String {
    negate_tags(&exclusion_tags(packs))
}

/// The tag expression handed to the engine: an explicit (command line) tag
/// expression wins outright; configuration exclusions apply only without one.
pub fn resolve_tags(explicit: &str, exclusions: &str) -> String {
    if explicit.trim().is_empty() {
        exclusions.to_string()
    } else {
        explicit.to_string()
    }
}

/// `["a", "b"]` to `@a,@b`.
pub fn cucumber_tags_list_to_string<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .map(|t| format!("@{}", t.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}
