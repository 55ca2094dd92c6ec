//! Cloud provider access for storage and APIM probes.
//!
//! Probes talk to Azure through the [`AzureApi`] trait. The client behind it is
//! built lazily by a [`CloudConnection`], which attempts the connection at most
//! once and remembers a failure so later probes can report the cloud as
//! unavailable without retrying.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::AzureConfig;
use crate::error::{ProbeError, ProbeResult};

/// Service principal used to authenticate against a subscription.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AzureCredentials {
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl AzureCredentials {
    /// Fails with the first empty field, in subscription/tenant/client/secret
    /// order.
    pub fn validate(&self) -> ProbeResult<()> {
        let fields = [
            ("SubscriptionID", &self.subscription_id),
            ("TenantID", &self.tenant_id),
            ("ClientID", &self.client_id),
            ("ClientSecret", &self.client_secret),
        ];
        match fields.iter().find(|(_, v)| v.is_empty()) {
            Some((field, _)) => Err(ProbeError::CloudUnavailable(format!(
                "azure credential '{field}' is not set"
            ))),
            None => Ok(()),
        }
    }
}

impl From<&AzureConfig> for AzureCredentials {
    fn from(cfg: &AzureConfig) -> Self {
        Self {
            subscription_id: cfg.subscription_id.clone(),
            tenant_id: cfg.tenant_id.clone(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
        }
    }
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    pub location: String,
    pub tags: BTreeMap<String, String>,
}

/// Parameters for creating a storage account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageAccountRequest {
    pub name: String,
    pub resource_group: String,
    pub tags: BTreeMap<String, String>,
    pub https_only: bool,
    /// Provider network rule set, passed through as-is.
    pub network_rule_set: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageAccount {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub https_only: bool,
}

/// Operations probes need from Azure.
#[async_trait]
pub trait AzureApi: Send + Sync {
    async fn resource_group(&self, name: &str) -> ProbeResult<ResourceGroup>;

    async fn create_storage_account(
        &self,
        request: &StorageAccountRequest,
    ) -> ProbeResult<StorageAccount>;

    async fn delete_storage_account(&self, resource_group: &str, account: &str)
        -> ProbeResult<()>;

    /// Managed cluster document, shaped like `az aks show`.
    async fn managed_cluster_json(&self, resource_group: &str, cluster: &str)
        -> ProbeResult<Value>;

    /// Managed disk document, shaped like `az disk show`.
    async fn disk_json(&self, resource_group: &str, disk: &str) -> ProbeResult<Value>;
}

/// Resource group and name of a managed disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskRef {
    pub resource_group: String,
    pub disk_name: String,
}

/// Split a managed disk resource id of the form
/// `/subscriptions/<id>/resourceGroups/<rg>/providers/Microsoft.Compute/disks/<name>`.
pub fn parse_disk_uri(uri: &str) -> ProbeResult<DiskRef> {
    let invalid = || ProbeError::CloudUnavailable(format!("malformed disk uri: '{uri}'"));

    let segments: Vec<&str> = uri.split('/').collect();
    if segments.len() < 9
        || !segments[3].eq_ignore_ascii_case("resourceGroups")
        || !segments[7].eq_ignore_ascii_case("disks")
    {
        return Err(invalid());
    }

    let (resource_group, disk_name) = (segments[4], segments[8]);
    if resource_group.is_empty() || disk_name.is_empty() {
        return Err(invalid());
    }

    Ok(DiskRef {
        resource_group: resource_group.to_string(),
        disk_name: disk_name.to_string(),
    })
}

/// Fetch a disk document by its resource id.
pub async fn disk_json_by_uri(api: &dyn AzureApi, uri: &str) -> ProbeResult<Value> {
    let disk = parse_disk_uri(uri)?;
    debug!(resource_group = %disk.resource_group, disk = %disk.disk_name, "fetching disk");
    api.disk_json(&disk.resource_group, &disk.disk_name).await
}

/// Lazily-connected cloud client shared by the probes of a run.
///
/// The first call to [`CloudConnection::connect_with`] runs the connector;
/// every later call gets the same client, or the same failure.
pub struct CloudConnection<C> {
    credentials: AzureCredentials,
    client: OnceCell<Result<Arc<C>, String>>,
}

impl<C: Send + Sync> CloudConnection<C> {
    pub fn new(credentials: AzureCredentials) -> Self {
        Self {
            credentials,
            client: OnceCell::new(),
        }
    }

    pub fn credentials(&self) -> &AzureCredentials {
        &self.credentials
    }

    /// Connect on first use. Concurrent callers wait for the single attempt.
    pub async fn connect_with<F, Fut>(&self, connect: F) -> ProbeResult<Arc<C>>
    where
        F: FnOnce(AzureCredentials) -> Fut,
        Fut: Future<Output = ProbeResult<C>>,
    {
        let slot = self
            .client
            .get_or_init(|| async move {
                let attempt = match self.credentials.validate() {
                    Ok(()) => connect(self.credentials.clone()).await,
                    Err(err) => Err(err),
                };
                match attempt {
                    Ok(client) => {
                        debug!(subscription = %self.credentials.subscription_id, "cloud connected");
                        Ok(Arc::new(client))
                    }
                    Err(err) => {
                        warn!(error = %err, "cloud connection failed");
                        Err(err.to_string())
                    }
                }
            })
            .await;

        slot.clone().map_err(ProbeError::CloudUnavailable)
    }

    /// The connected client, if a connection succeeded.
    pub fn client(&self) -> Option<Arc<C>> {
        self.client.get().and_then(|slot| slot.as_ref().ok().cloned())
    }

    /// Reports a remembered connection failure. Not having attempted a
    /// connection yet is not a failure.
    pub fn is_cloud_available(&self) -> ProbeResult<()> {
        match self.client.get() {
            Some(Err(msg)) => Err(ProbeError::CloudUnavailable(msg.clone())),
            _ => Ok(()),
        }
    }
}

impl<C> std::fmt::Debug for CloudConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConnection")
            .field("credentials", &self.credentials)
            .field("initialized", &self.client.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryAzureApi;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn creds() -> AzureCredentials {
        AzureCredentials {
            subscription_id: "sub".into(),
            tenant_id: "tenant".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
        }
    }

    #[test]
    fn test_parse_disk_uri() {
        let uri = "/subscriptions/b82de549/resourceGroups/mc_probr-demo-rg_eastus2/providers/Microsoft.Compute/disks/kubernetes-dynamic-pvc-17a4";
        let disk = parse_disk_uri(uri).unwrap();
        assert_eq!(disk.resource_group, "mc_probr-demo-rg_eastus2");
        assert_eq!(disk.disk_name, "kubernetes-dynamic-pvc-17a4");
    }

    #[test]
    fn test_parse_disk_uri_rejects_short_or_foreign_ids() {
        assert!(parse_disk_uri("/subscriptions/x/resourceGroups/rg").is_err());
        assert!(parse_disk_uri(
            "/subscriptions/x/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/sa"
        )
        .is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let shown = format!("{:?}", creds());
        assert!(!shown.contains("secret\""));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_credentials_from_config() {
        let cfg = AzureConfig {
            subscription_id: "sub".into(),
            client_secret: "s".into(),
            ..AzureConfig::default()
        };
        let err = AzureCredentials::from(&cfg).validate().unwrap_err();
        assert!(err.to_string().contains("TenantID"));
    }

    #[tokio::test]
    async fn test_connects_at_most_once() {
        let conn: CloudConnection<MemoryAzureApi> = CloudConnection::new(creds());
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;

        for _ in 0..3 {
            conn.connect_with(move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(MemoryAzureApi::new())
            })
            .await
            .unwrap();
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(conn.client().is_some());
        assert!(conn.is_cloud_available().is_ok());
    }

    #[tokio::test]
    async fn test_failure_is_remembered() {
        let conn: CloudConnection<MemoryAzureApi> = CloudConnection::new(creds());
        assert!(conn.is_cloud_available().is_ok());

        let err = conn
            .connect_with(|_| async { Err(ProbeError::CloudUnavailable("authorizer".into())) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("authorizer"));

        let again = conn
            .connect_with(|_| async { Ok(MemoryAzureApi::new()) })
            .await;
        assert!(again.is_err());
        assert!(conn.is_cloud_available().is_err());
        assert!(conn.client().is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_never_call_connector() {
        let conn: CloudConnection<MemoryAzureApi> =
            CloudConnection::new(AzureCredentials::default());
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let err = conn
            .connect_with(move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(MemoryAzureApi::new())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::CloudUnavailable(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disk_json_by_uri() {
        let api = MemoryAzureApi::new();
        api.insert_disk("rg", "pvc-1", serde_json::json!({"name": "pvc-1"}));
        let doc = disk_json_by_uri(
            &api,
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/disks/pvc-1",
        )
        .await
        .unwrap();
        assert_eq!(doc["name"], "pvc-1");
    }
}
