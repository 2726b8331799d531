//! Tenant Custom Resource Definition
//!
//! A Tenant describes one isolated workspace on the shared cluster. The
//! operator derives a namespace and an admin RoleBinding from it; everything
//! derived is a pure function of the tenant name.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use kube::core::ObjectList;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::TENANT_NAMESPACE_PREFIX;

/// Specification for a Tenant
///
/// Example:
/// ```yaml
/// apiVersion: genesis.ai/v1
/// kind: Tenant
/// metadata:
///   name: acme
/// spec:
///   displayName: Acme Corp
///   isolation: namespace
///   quota: medium
///   oidcGroup: acme-platform
///   complianceFrameworks: [soc2, gdpr]
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "genesis.ai",
    version = "v1",
    kind = "Tenant",
    plural = "tenants",
    shortname = "tn",
    status = "TenantStatus",
    printcolumn = r#"{"name":"Display Name","type":"string","jsonPath":".spec.displayName"}"#,
    printcolumn = r#"{"name":"Isolation","type":"string","jsonPath":".spec.isolation"}"#,
    printcolumn = r#"{"name":"Namespace","type":"string","jsonPath":".status.namespace"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    /// Human-readable label, never empty
    pub display_name: String,

    /// Sizing class (defaulted to `medium` at admission)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<String>,

    /// External identity group bound to this tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_group: Option<String>,

    /// How the tenant's workloads are segregated
    pub isolation: IsolationMode,

    /// ESG reporting feature flag (defaulted to `false` at admission)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esg_enabled: Option<bool>,

    /// Compliance framework identifiers. Order carries no meaning but is
    /// preserved on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_frameworks: Option<Vec<String>>,
}

impl TenantSpec {
    /// Compliance frameworks as an order-independent set
    pub fn compliance_frameworks(&self) -> BTreeSet<&str> {
        self.compliance_frameworks
            .iter()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Whether ESG reporting is enabled (absent means disabled)
    pub fn esg_enabled(&self) -> bool {
        self.esg_enabled.unwrap_or(false)
    }
}

/// Workload segregation strategy for a tenant
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// Workloads share the cluster, separated by namespace
    Namespace,
    /// Workloads run on a dedicated cluster
    Cluster,
    /// Workloads are separated at the network layer
    Network,
}

impl IsolationMode {
    /// Every recognized isolation mode, in display order
    pub const ALL: [IsolationMode; 3] = [
        IsolationMode::Namespace,
        IsolationMode::Cluster,
        IsolationMode::Network,
    ];

    /// Wire representation of this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationMode::Namespace => "namespace",
            IsolationMode::Cluster => "cluster",
            IsolationMode::Network => "network",
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IsolationMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown isolation mode '{}'", s))
    }
}

/// Observed state of a Tenant
///
/// Only `namespace` is written by the tenant controller. The remaining fields
/// record the state of downstream integrations and are owned by them.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantStatus {
    /// Lifecycle marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Resolved namespace name (`tenant-<name>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Runtime intrusion detection is active for the tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub falco_enabled: Option<bool>,

    /// Workload identities are registered with the attestation service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spire_registered: Option<bool>,

    /// A backup schedule exists for the tenant namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_scheduled: Option<bool>,

    /// Latest compliance score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esg_score: Option<f64>,

    /// Timestamp of the last audit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_audit: Option<String>,
}

impl TenantStatus {
    /// Status carrying only the resolved namespace
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }
}

/// A collection of Tenants as returned by a list call
pub type TenantList = ObjectList<Tenant>;

/// Namespace derived from a tenant name
pub fn tenant_namespace_name(tenant: &str) -> String {
    format!("{}{}", TENANT_NAMESPACE_PREFIX, tenant)
}

/// External identity group granted admin rights in the tenant namespace
pub fn tenant_admin_group(tenant: &str) -> String {
    format!("{}{}-admins", TENANT_NAMESPACE_PREFIX, tenant)
}

impl Tenant {
    /// Namespace this tenant owns
    pub fn namespace_name(&self) -> String {
        tenant_namespace_name(&self.name_any())
    }

    /// Admin group for this tenant
    pub fn admin_group(&self) -> String {
        tenant_admin_group(&self.name_any())
    }

    /// Namespace currently recorded in status, if any
    pub fn recorded_namespace(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.namespace.as_deref())
    }

    /// Whether the tenant has been marked for deletion
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> TenantSpec {
        TenantSpec {
            display_name: "Acme Corp".to_string(),
            quota: Some("medium".to_string()),
            oidc_group: None,
            isolation: IsolationMode::Namespace,
            esg_enabled: Some(false),
            compliance_frameworks: None,
        }
    }

    // =========================================================================
    // Naming Stories
    // =========================================================================

    /// Story: derived names depend on nothing but the tenant name
    #[test]
    fn story_derived_names_are_deterministic() {
        assert_eq!(tenant_namespace_name("acme"), "tenant-acme");
        assert_eq!(tenant_admin_group("acme"), "tenant-acme-admins");

        let tenant = Tenant::new("acme", sample_spec());
        for _ in 0..3 {
            assert_eq!(tenant.namespace_name(), "tenant-acme");
            assert_eq!(tenant.admin_group(), "tenant-acme-admins");
        }
    }

    #[test]
    fn recorded_namespace_reads_status() {
        let mut tenant = Tenant::new("acme", sample_spec());
        assert_eq!(tenant.recorded_namespace(), None);

        tenant.status = Some(TenantStatus::with_namespace("tenant-acme"));
        assert_eq!(tenant.recorded_namespace(), Some("tenant-acme"));
    }

    // =========================================================================
    // Isolation Mode
    // =========================================================================

    #[test]
    fn isolation_mode_parses_known_values() {
        for mode in IsolationMode::ALL {
            assert_eq!(mode.as_str().parse::<IsolationMode>(), Ok(mode));
            assert_eq!(mode.to_string(), mode.as_str());
        }
        assert!("global".parse::<IsolationMode>().is_err());
        assert!("Namespace".parse::<IsolationMode>().is_err());
    }

    #[test]
    fn isolation_mode_rejects_unknown_wire_value() {
        let json = r#"{"displayName":"X","isolation":"global"}"#;
        assert!(serde_json::from_str::<TenantSpec>(json).is_err());
    }

    // =========================================================================
    // Serialization Stories
    // =========================================================================

    /// Story: omitted optional fields stay absent after a round trip
    ///
    /// Admission needs to tell "omitted" apart from "explicitly false", so the
    /// model must never materialize defaults on its own.
    #[test]
    fn story_omitted_fields_stay_absent() {
        let json = r#"{"displayName":"Acme Corp","isolation":"cluster"}"#;
        let spec: TenantSpec = serde_json::from_str(json).expect("parse spec");

        assert_eq!(spec.quota, None);
        assert_eq!(spec.esg_enabled, None);
        assert!(!spec.esg_enabled());

        let out = serde_json::to_string(&spec).expect("serialize spec");
        assert_eq!(out, json);
    }

    /// Story: explicit zero values are kept distinct from absence
    #[test]
    fn story_explicit_false_survives() {
        let json = r#"{"displayName":"Acme Corp","isolation":"network","esgEnabled":false}"#;
        let spec: TenantSpec = serde_json::from_str(json).expect("parse spec");
        assert_eq!(spec.esg_enabled, Some(false));
        assert_eq!(serde_json::to_string(&spec).expect("serialize spec"), json);
    }

    /// Story: a persisted Tenant round-trips byte for byte
    #[test]
    fn story_tenant_document_round_trips() {
        let json = concat!(
            r#"{"apiVersion":"genesis.ai/v1","kind":"Tenant","metadata":{"name":"acme"},"#,
            r#""spec":{"displayName":"Acme Corp","quota":"large","oidcGroup":"acme-ops","#,
            r#""isolation":"namespace","esgEnabled":true,"complianceFrameworks":["soc2","gdpr"]},"#,
            r#""status":{"namespace":"tenant-acme","falcoEnabled":true,"esgScore":87.5}}"#
        );

        let tenant: Tenant = serde_json::from_str(json).expect("parse tenant");
        assert_eq!(tenant.name_any(), "acme");
        assert_eq!(tenant.spec.oidc_group.as_deref(), Some("acme-ops"));
        assert_eq!(tenant.recorded_namespace(), Some("tenant-acme"));

        let out = serde_json::to_string(&tenant).expect("serialize tenant");
        assert_eq!(out, json);
    }

    #[test]
    fn compliance_frameworks_compare_as_set() {
        let mut a = sample_spec();
        a.compliance_frameworks = Some(vec!["soc2".to_string(), "gdpr".to_string()]);
        let mut b = sample_spec();
        b.compliance_frameworks = Some(vec!["gdpr".to_string(), "soc2".to_string()]);

        assert_eq!(a.compliance_frameworks(), b.compliance_frameworks());
        assert!(sample_spec().compliance_frameworks().is_empty());
    }

    #[test]
    fn tenant_list_decodes() {
        let json = r#"{
            "apiVersion": "genesis.ai/v1",
            "kind": "TenantList",
            "metadata": {"resourceVersion": "42"},
            "items": [
                {"apiVersion":"genesis.ai/v1","kind":"Tenant","metadata":{"name":"acme"},
                 "spec":{"displayName":"Acme Corp","isolation":"namespace"}},
                {"apiVersion":"genesis.ai/v1","kind":"Tenant","metadata":{"name":"globex"},
                 "spec":{"displayName":"Globex","isolation":"cluster"}}
            ]
        }"#;

        let list: TenantList = serde_json::from_str(json).expect("parse list");
        let names: Vec<String> = list.items.iter().map(|t| t.name_any()).collect();
        assert_eq!(names, vec!["acme", "globex"]);
        assert_eq!(list.items[1].spec.isolation, IsolationMode::Cluster);
    }

    #[test]
    fn yaml_manifest_parses() {
        let yaml = r#"
apiVersion: genesis.ai/v1
kind: Tenant
metadata:
  name: initech
spec:
  displayName: Initech
  isolation: network
  complianceFrameworks:
    - hipaa
"#;
        let tenant: Tenant = serde_yaml::from_str(yaml).expect("parse yaml");
        assert_eq!(tenant.namespace_name(), "tenant-initech");
        assert_eq!(tenant.spec.isolation, IsolationMode::Network);
        assert_eq!(
            tenant.spec.compliance_frameworks(),
            BTreeSet::from(["hipaa"])
        );
    }
}
