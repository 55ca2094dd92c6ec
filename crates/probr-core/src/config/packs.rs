//! Service pack and cloud provider sections of the configuration.

use serde::{Deserialize, Serialize};

/// Per-scenario configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ScenarioConfig {
    pub name: String,
    /// Justification for skipping; non-empty means excluded.
    pub excluded: String,
}

/// Per-probe configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProbeConfig {
    pub name: String,
    /// Justification for skipping; non-empty means excluded.
    pub excluded: String,
    pub scenarios: Vec<ScenarioConfig>,
}

impl ProbeConfig {
    pub fn scenario(&self, name: &str) -> Option<&ScenarioConfig> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct KubernetesPack {
    pub kube_config_path: String,
    pub kube_context: String,
    pub authorised_container_image: String,
    pub probes: Vec<ProbeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct StoragePack {
    pub provider: String,
    pub probes: Vec<ProbeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ApimPack {
    pub provider: String,
    pub probes: Vec<ProbeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ServicePacks {
    pub kubernetes: KubernetesPack,
    pub storage: StoragePack,
    #[serde(rename = "APIM")]
    pub apim: ApimPack,
}

impl ServicePacks {
    pub const NAMES: [&'static str; 3] = ["kubernetes", "storage", "apim"];

    /// Probe sections keyed by lowercase pack name, in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[ProbeConfig])> {
        [
            ("kubernetes", self.kubernetes.probes.as_slice()),
            ("storage", self.storage.probes.as_slice()),
            ("apim", self.apim.probes.as_slice()),
        ]
        .into_iter()
    }

    /// Probe section of a pack, matched case-insensitively.
    pub fn probes(&self, pack: &str) -> Option<&[ProbeConfig]> {
        self.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(pack))
            .map(|(_, probes)| probes)
    }

    pub fn probe(&self, pack: &str, probe: &str) -> Option<&ProbeConfig> {
        self.probes(pack)?.iter().find(|p| p.name == probe)
    }
}

/// Azure credentials and placement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    #[serde(rename = "SubscriptionID")]
    pub subscription_id: String,
    #[serde(rename = "TenantID")]
    pub tenant_id: String,
    #[serde(rename = "ClientID")]
    pub client_id: String,
    #[serde(rename = "ClientSecret", skip_serializing)]
    pub client_secret: String,
    #[serde(rename = "ResourceGroup")]
    pub resource_group: String,
    #[serde(rename = "ResourceLocation")]
    pub resource_location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CloudProviders {
    pub azure: AzureConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_lookup_is_case_insensitive() {
        let packs = ServicePacks {
            apim: ApimPack {
                provider: "Azure".into(),
                probes: vec![ProbeConfig {
                    name: "apim_tls".into(),
                    ..ProbeConfig::default()
                }],
            },
            ..ServicePacks::default()
        };
        assert_eq!(packs.probes("APIM").map(|p| p.len()), Some(1));
        assert!(packs.probe("apim", "apim_tls").is_some());
        assert!(packs.probe("apim", "missing").is_none());
        assert!(packs.probes("unknown").is_none());
    }
}
