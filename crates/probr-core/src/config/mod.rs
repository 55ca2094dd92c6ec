//! Run configuration loaded from a YAML vars file.
//!
//! Values not present in the file fall back to environment variables and then
//! to built-in defaults. Keys use the PascalCase names of the vars file:
//!
//! ```yaml
//! LogLevel: INFO
//! WriteDirectory: probr_output
//! Tags: ""
//! TagExclusions: ["probes/kubernetes/iam"]
//! Meta:
//!   RunOnly: kubernetes
//! ServicePacks:
//!   Kubernetes:
//!     AuthorisedContainerImage: registry.local/busybox
//!     Probes:
//!       - Name: pod_security
//!         Scenarios:
//!           - Name: privileged_containers
//!             Excluded: "not applicable to managed clusters"
//! CloudProviders:
//!   Azure:
//!     SubscriptionID: 00000000-0000-0000-0000-000000000000
//! ```

pub mod packs;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub use packs::{
    ApimPack, AzureConfig, CloudProviders, KubernetesPack, ProbeConfig, ScenarioConfig,
    ServicePacks, StoragePack,
};

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_LOG_LEVEL: &str = "ERROR";
pub const DEFAULT_WRITE_DIRECTORY: &str = "probr_output";

/// Runtime metadata that is not read from the vars file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Meta {
    /// Restrict execution to a single pack.
    pub run_only: String,
}

/// How the external BDD runner is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EngineConfig {
    /// Runner executable followed by fixed arguments.
    pub command: Vec<String>,
    /// Root directory holding `<pack>/*.feature`.
    pub features_directory: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: vec!["cucumber".to_string()],
            features_directory: "features".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProbrConfig {
    pub log_level: String,
    pub write_directory: String,
    pub write_config: String,
    pub overwrite_historical_audits: String,
    /// Tag expression supplied explicitly; takes precedence over exclusions.
    pub tags: String,
    pub tag_exclusions: Vec<String>,
    pub meta: Meta,
    pub service_packs: ServicePacks,
    pub cloud_providers: CloudProviders,
    pub engine: EngineConfig,
}

impl ProbrConfig {
    /// Parse a config from YAML text without applying fallbacks.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a config file. An empty path yields the default configuration.
    ///
    /// Environment and default fallbacks are applied after decoding.
    pub fn load(path: &str) -> ConfigResult<Self> {
        let mut config = if path.is_empty() {
            ProbrConfig::default()
        } else {
            let path = Path::new(path);
            validate_config_path(path)?;
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_yaml(&text)?
        };
        config.apply_env_and_defaults(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file while keeping runtime metadata set earlier
    /// (for example a RunOnly pack chosen on the command line).
    pub fn reload(&mut self, path: &str) -> ConfigResult<()> {
        let meta = self.meta.clone();
        *self = Self::load(path)?;
        if !meta.run_only.is_empty() {
            self.meta = meta;
        }
        Ok(())
    }

    /// Fill unset values from `lookup` (the environment) and then defaults.
    pub fn apply_env_and_defaults(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fill = |field: &mut String, key: &str, default: &str| {
            if field.is_empty() {
                *field = lookup(key)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| default.to_string());
            }
        };

        fill(&mut self.log_level, "PROBR_LOG_LEVEL", DEFAULT_LOG_LEVEL);
        fill(
            &mut self.write_directory,
            "PROBR_WRITE_DIRECTORY",
            DEFAULT_WRITE_DIRECTORY,
        );
        fill(&mut self.tags, "PROBR_TAGS", "");
        fill(&mut self.meta.run_only, "PROBR_RUN_ONLY", "");

        let azure = &mut self.cloud_providers.azure;
        fill(&mut azure.subscription_id, "AZURE_SUBSCRIPTION_ID", "");
        fill(&mut azure.tenant_id, "AZURE_TENANT_ID", "");
        fill(&mut azure.client_id, "AZURE_CLIENT_ID", "");
        fill(&mut azure.client_secret, "AZURE_CLIENT_SECRET", "");
    }

    /// `OverwriteHistoricalAudits` as a bool; unparseable values are false.
    pub fn overwrite(&self) -> bool {
        self.overwrite_historical_audits
            .trim()
            .to_ascii_lowercase()
            .parse()
            .unwrap_or(false)
    }

    /// `<WriteDirectory>/<executable name>`, created if missing.
    pub fn write_dir(&self) -> ConfigResult<PathBuf> {
        let dir = Path::new(&self.write_directory).join(executable_name());
        create_dir(&dir)?;
        Ok(dir)
    }

    pub fn audit_dir(&self) -> ConfigResult<PathBuf> {
        self.sub_dir("audit")
    }

    pub fn cucumber_dir(&self) -> ConfigResult<PathBuf> {
        self.sub_dir("cucumber")
    }

    pub fn tmp_dir(&self) -> ConfigResult<PathBuf> {
        self.sub_dir("tmp")
    }

    fn sub_dir(&self, name: &str) -> ConfigResult<PathBuf> {
        let dir = self.write_dir()?.join(name);
        create_dir(&dir)?;
        Ok(dir)
    }

    /// Write the effective config to `config.json` when `WriteConfig` is
    /// `"true"`. Returns the path written, if any.
    pub fn log_config_state(&self) -> ConfigResult<Option<PathBuf>> {
        let json = serde_json::to_string_pretty(self)?;
        debug!(config = %json, "config state");
        if self.write_config != "true" {
            return Ok(None);
        }
        let path = self.write_dir()?.join("config.json");
        std::fs::write(&path, json).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }
}

/// Ensure the config path exists and is a regular file.
pub fn validate_config_path(path: &Path) -> ConfigResult<()> {
    let meta = std::fs::metadata(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.is_dir() {
        return Err(ConfigError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

fn create_dir(dir: &Path) -> ConfigResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn executable_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "probr".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE_YAML: &str = r#"
LogLevel: INFO
OverwriteHistoricalAudits: "True"
TagExclusions: ["probes/storage/legacy"]
ServicePacks:
  Kubernetes:
    AuthorisedContainerImage: registry.local/busybox
    Probes:
      - Name: pod_security
        Scenarios:
          - Name: privileged_containers
            Excluded: "managed cluster"
      - Name: iam
        Excluded: "no AAD pod identity"
  Storage:
    Provider: Azure
  APIM:
    Provider: Azure
CloudProviders:
  Azure:
    SubscriptionID: sub-123
    ClientSecret: hunter2
"#;

    #[test]
    fn test_parse_yaml_config() {
        let config = ProbrConfig::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.tag_exclusions, vec!["probes/storage/legacy"]);
        let k8s = &config.service_packs.kubernetes;
        assert_eq!(k8s.authorised_container_image, "registry.local/busybox");
        assert_eq!(k8s.probes.len(), 2);
        assert_eq!(k8s.probes[0].scenarios[0].excluded, "managed cluster");
        assert_eq!(config.service_packs.apim.provider, "Azure");
        assert_eq!(config.cloud_providers.azure.subscription_id, "sub-123");
        assert!(config.overwrite());
    }

    #[test]
    fn test_env_and_defaults_fill_only_unset_values() {
        let mut config = ProbrConfig::from_yaml(SAMPLE_YAML).unwrap();
        let env: HashMap<&str, &str> = [
            ("PROBR_LOG_LEVEL", "DEBUG"),
            ("AZURE_TENANT_ID", "tenant-9"),
            ("AZURE_SUBSCRIPTION_ID", "sub-env"),
        ]
        .into_iter()
        .collect();
        config.apply_env_and_defaults(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.write_directory, DEFAULT_WRITE_DIRECTORY);
        assert_eq!(config.cloud_providers.azure.tenant_id, "tenant-9");
        assert_eq!(config.cloud_providers.azure.subscription_id, "sub-123");
    }

    #[test]
    fn test_load_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProbrConfig::load(dir.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::NotAFile(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ProbrConfig::load("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_malformed_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "ServicePacks: [unterminated").unwrap();
        let err = ProbrConfig::load(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_reload_keeps_run_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, SAMPLE_YAML).unwrap();

        let mut config = ProbrConfig::default();
        config.meta.run_only = "storage".to_string();
        config.reload(path.to_str().unwrap()).unwrap();

        assert_eq!(config.meta.run_only, "storage");
        assert_eq!(config.service_packs.kubernetes.probes.len(), 2);
    }

    #[test]
    fn test_overwrite_parse_failure_is_false() {
        let config = ProbrConfig {
            overwrite_historical_audits: "sometimes".to_string(),
            ..ProbrConfig::default()
        };
        assert!(!config.overwrite());
    }

    #[test]
    fn test_log_config_state_omits_secret() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProbrConfig::from_yaml(SAMPLE_YAML).unwrap();
        config.write_directory = dir.path().to_string_lossy().into_owned();
        config.write_config = "true".to_string();

        let path = config.log_config_state().unwrap().expect("written");
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("sub-123"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_output_dirs_nest_under_write_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProbrConfig {
            write_directory: dir.path().to_string_lossy().into_owned(),
            ..ProbrConfig::default()
        };
        let audit = config.audit_dir().unwrap();
        assert!(audit.is_dir());
        assert!(audit.starts_with(dir.path()));
        assert!(audit.ends_with("audit"));
        assert!(config.cucumber_dir().unwrap().is_dir());
        assert!(config.tmp_dir().unwrap().is_dir());
    }
}
