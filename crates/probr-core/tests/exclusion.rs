//! Exclusion policy tests: pack requirements, RunOnly and tag precedence.

use probr_core::policy::{
    build_exclusion_expression, pack_exclusion, resolve_tags, Requirement, RequirementTable,
};
use probr_core::{ExclusionPolicy, ExclusionReason, ProbrConfig};

fn subscription_id(config: &ProbrConfig) -> &str {
    &config.cloud_providers.azure.subscription_id
}

fn storage_requires_subscription() -> RequirementTable {
    RequirementTable::empty().with_pack(
        "storage",
        vec![Requirement::new("SubscriptionID", subscription_id)],
    )
}

fn config(yaml: &str) -> ProbrConfig {
    ProbrConfig::from_yaml(yaml).unwrap()
}

#[test]
fn test_missing_subscription_excludes_regardless_of_run_only() {
    let table = storage_requires_subscription();

    for run_only in ["", "storage", "STORAGE", "kubernetes"] {
        let mut cfg = config("{}");
        cfg.meta.run_only = run_only.to_string();
        assert_eq!(
            pack_exclusion("storage", &cfg, &table),
            Some(ExclusionReason::MissingRequirement {
                pack: "storage".into(),
                field: "SubscriptionID".into(),
            }),
            "RunOnly = {run_only:?}"
        );
    }
}

#[test]
fn test_run_only_mismatch_excludes_a_complete_pack() {
    let table = storage_requires_subscription();
    let mut cfg = config(
        r#"
CloudProviders:
  Azure:
    SubscriptionID: 00000000-0000-0000-0000-000000000000
"#,
    );

    assert_eq!(pack_exclusion("storage", &cfg, &table), None);

    cfg.meta.run_only = "kubernetes".into();
    assert!(matches!(
        pack_exclusion("storage", &cfg, &table),
        Some(ExclusionReason::NotRunOnly { .. })
    ));

    cfg.meta.run_only = "Storage".into();
    assert_eq!(pack_exclusion("storage", &cfg, &table), None);
}

#[test]
fn test_builtin_requirements() {
    let cfg = config(
        r#"
ServicePacks:
  Kubernetes:
    AuthorisedContainerImage: busybox
  Storage:
    Provider: Azure
CloudProviders:
  Azure:
    SubscriptionID: sub
"#,
    );
    let policy = ExclusionPolicy::builtin(cfg);
    assert_eq!(policy.pack("kubernetes"), None);
    assert_eq!(policy.pack("storage"), None);
    assert!(matches!(
        policy.pack("apim"),
        Some(ExclusionReason::MissingRequirement { ref field, .. }) if field == "Provider"
    ));
}

#[test]
fn test_explicit_tags_disable_configuration_exclusions() {
    let yaml = r#"
Tags: "@probes/kubernetes/iam"
TagExclusions: ["@slow"]
ServicePacks:
  Kubernetes:
    AuthorisedContainerImage: busybox
    Probes:
      - Name: pod_security
        Excluded: "managed"
"#;
    let policy = ExclusionPolicy::builtin(config(yaml));
    assert_eq!(policy.effective_tags(), "@probes/kubernetes/iam");

    let mut cfg = config(yaml);
    cfg.tags.clear();
    let policy = ExclusionPolicy::builtin(cfg);
    assert_eq!(
        policy.effective_tags(),
        "~@probes/kubernetes/pod_security && ~@slow"
    );
}

#[test]
fn test_whitespace_tags_count_as_empty() {
    assert_eq!(resolve_tags("  ", "~@probes/a/b"), "~@probes/a/b");
    assert_eq!(resolve_tags("@x", "~@probes/a/b"), "@x");
}

#[test]
fn test_build_expression_over_all_packs() {
    let cfg = config(
        r#"
ServicePacks:
  Kubernetes:
    Probes:
      - Name: iam
        Scenarios:
          - Name: escalate
            Excluded: "n/a"
  APIM:
    Probes:
      - Name: apim_tls
        Excluded: "no gateway"
"#,
    );
    assert_eq!(
        build_exclusion_expression(cfg.service_packs.iter()),
        "~@probes/kubernetes/iam/escalate && ~@probes/apim/apim_tls"
    );
}
