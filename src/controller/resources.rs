//! Cluster objects derived from a Tenant
//!
//! Both builders are pure functions of the tenant, so building twice yields
//! identical objects.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

use crate::crd::Tenant;
use crate::{MANAGED_BY_LABEL, MANAGED_BY_VALUE, TENANT_LABEL};

/// Name of the admin RoleBinding in every tenant namespace
pub const TENANT_ADMIN_BINDING: &str = "tenant-admin";

/// ClusterRole granted to the tenant's admin group
pub const ADMIN_CLUSTER_ROLE: &str = "admin";

/// Pod Security admission level enforced in tenant namespaces
pub const POD_SECURITY_LEVEL: &str = "restricted";

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
const POD_SECURITY_ENFORCE_LABEL: &str = "pod-security.kubernetes.io/enforce";
const POD_SECURITY_VERSION_LABEL: &str = "pod-security.kubernetes.io/enforce-version";

/// Labels applied to every namespace owned by `tenant`
pub fn tenant_namespace_labels(tenant: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (TENANT_LABEL.to_string(), tenant.to_string()),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        (
            POD_SECURITY_ENFORCE_LABEL.to_string(),
            POD_SECURITY_LEVEL.to_string(),
        ),
        (POD_SECURITY_VERSION_LABEL.to_string(), "latest".to_string()),
    ])
}

/// Namespace for `tenant`
///
/// Carries a controller owner reference when the tenant has a UID, so the
/// garbage collector removes the namespace once the tenant is deleted.
pub fn tenant_namespace(tenant: &Tenant) -> Namespace {
    let owner_references: Vec<_> = tenant.controller_owner_ref(&()).into_iter().collect();

    Namespace {
        metadata: ObjectMeta {
            name: Some(tenant.namespace_name()),
            labels: Some(tenant_namespace_labels(&tenant.name_any())),
            owner_references: (!owner_references.is_empty()).then_some(owner_references),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// RoleBinding granting the tenant's admin group the `admin` ClusterRole
pub fn tenant_admin_binding(tenant: &Tenant) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(TENANT_ADMIN_BINDING.to_string()),
            namespace: Some(tenant.namespace_name()),
            labels: Some(BTreeMap::from([
                (TENANT_LABEL.to_string(), tenant.name_any()),
                (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
            ])),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: ADMIN_CLUSTER_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            api_group: Some(RBAC_API_GROUP.to_string()),
            kind: "Group".to_string(),
            name: tenant.admin_group(),
            namespace: None,
        }]),
    }
}
