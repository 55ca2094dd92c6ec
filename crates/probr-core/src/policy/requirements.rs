//! Required configuration fields per service pack.
//!
//! Each pack declares the fields that must be set before it can run, as named
//! accessors over [`ProbrConfig`]. Adding a pack means adding a table entry.

use std::collections::BTreeMap;

use crate::config::ProbrConfig;

/// Reads one configuration field.
pub type FieldAccessor = fn(&ProbrConfig) -> &str;

/// A named configuration field a pack depends on.
#[derive(Clone, Copy)]
pub struct Requirement {
    pub field: &'static str,
    pub read: FieldAccessor,
}

impl Requirement {
    pub const fn new(field: &'static str, read: FieldAccessor) -> Self {
        Self { field, read }
    }

    pub fn is_satisfied(&self, config: &ProbrConfig) -> bool {
        !(self.read)(config).is_empty()
    }
}

impl std::fmt::Debug for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Requirement").field(&self.field).finish()
    }
}

fn authorised_container_image(c: &ProbrConfig) -> &str {
    &c.service_packs.kubernetes.authorised_container_image
}

fn storage_provider(c: &ProbrConfig) -> &str {
    &c.service_packs.storage.provider
}

fn apim_provider(c: &ProbrConfig) -> &str {
    &c.service_packs.apim.provider
}

fn azure_subscription_id(c: &ProbrConfig) -> &str {
    &c.cloud_providers.azure.subscription_id
}

/// Pack name (lowercase) to its required fields.
#[derive(Debug, Clone, Default)]
pub struct RequirementTable {
    packs: BTreeMap<String, Vec<Requirement>>,
}

impl RequirementTable {
    /// A table with no packs; every pack is treated as having no requirements.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Requirements for the built-in service packs.
    pub fn builtin() -> Self {
        Self::empty()
            .with_pack(
                "kubernetes",
                vec![Requirement::new(
                    "AuthorisedContainerImage",
                    authorised_container_image,
                )],
            )
            .with_pack(
                "storage",
                vec![
                    Requirement::new("Provider", storage_provider),
                    Requirement::new("SubscriptionID", azure_subscription_id),
                ],
            )
            .with_pack(
                "apim",
                vec![
                    Requirement::new("Provider", apim_provider),
                    Requirement::new("SubscriptionID", azure_subscription_id),
                ],
            )
    }

    /// Set the requirements of a pack, replacing any previous entry.
    pub fn with_pack(mut self, pack: &str, requirements: Vec<Requirement>) -> Self {
        self.packs.insert(pack.to_ascii_lowercase(), requirements);
        self
    }

    pub fn requirements(&self, pack: &str) -> &[Requirement] {
        self.packs
            .get(&pack.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Known pack names, ordered.
    pub fn packs(&self) -> impl Iterator<Item = &str> {
        self.packs.keys().map(String::as_str)
    }

    /// First required field of `pack` that is unset in `config`.
    pub fn first_missing(&self, pack: &str, config: &ProbrConfig) -> Option<&'static str> {
        self.requirements(pack)
            .iter()
            .find(|r| !r.is_satisfied(config))
            .map(|r| r.field)
    }
}
