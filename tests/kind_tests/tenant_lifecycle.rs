//! Tenant lifecycle against a real API server

use std::sync::Arc;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, CustomResourceExt};

use genesis_operator::controller::{reconcile_tenant, Context, ReconcileOutcome};
use genesis_operator::crd::{IsolationMode, Tenant, TenantSpec};
use genesis_operator::FIELD_MANAGER;

async fn client_with_crd() -> Client {
    let client = Client::try_default()
        .await
        .expect("kubeconfig for a test cluster");
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    crds.patch(
        "tenants.genesis.ai",
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&Tenant::crd()),
    )
    .await
    .expect("install Tenant CRD");
    // The API server needs a moment before the new resource is served
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    client
}

/// Story: an operator creates a Tenant and gets a ready namespace
///
/// Expected behavior:
/// - The namespace `tenant-<name>` exists with tenant labels
/// - The `tenant-admin` binding grants `admin` to the tenant's admin group
/// - Status records the namespace
/// - A second reconcile changes nothing
#[tokio::test]
#[ignore = "requires a cluster - run with: cargo test --test kind -- --ignored"]
async fn story_tenant_is_provisioned_on_live_cluster() {
    let client = client_with_crd().await;
    let tenants: Api<Tenant> = Api::all(client.clone());
    let name = "genesis-e2e";

    let _ = tenants.delete(name, &DeleteParams::default()).await;

    let tenant = Tenant::new(
        name,
        TenantSpec {
            display_name: "Genesis E2E".to_string(),
            quota: None,
            oidc_group: None,
            isolation: IsolationMode::Namespace,
            esg_enabled: None,
            compliance_frameworks: Some(vec!["soc2".to_string()]),
        },
    );
    tenants
        .create(&PostParams::default(), &tenant)
        .await
        .expect("create tenant");

    let ctx = Arc::new(Context::builder(client.clone()).build());
    let first = reconcile_tenant(name, &ctx).await.expect("first reconcile");
    assert!(matches!(first, ReconcileOutcome::Converged { .. }));

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = namespaces
        .get("tenant-genesis-e2e")
        .await
        .expect("tenant namespace");
    let labels = ns.metadata.labels.unwrap_or_default();
    assert_eq!(labels.get("genesis.ai/tenant").map(String::as_str), Some(name));

    let bindings: Api<RoleBinding> = Api::namespaced(client.clone(), "tenant-genesis-e2e");
    let binding = bindings.get("tenant-admin").await.expect("admin binding");
    assert_eq!(binding.role_ref.name, "admin");

    let stored = tenants.get(name).await.expect("tenant");
    assert_eq!(stored.recorded_namespace(), Some("tenant-genesis-e2e"));

    let second = reconcile_tenant(name, &ctx).await.expect("second reconcile");
    assert_eq!(
        second,
        ReconcileOutcome::Converged {
            namespace: "tenant-genesis-e2e".to_string(),
            created_namespace: false,
            created_binding: false,
            status_updated: false,
        }
    );

    tenants
        .delete(name, &DeleteParams::default())
        .await
        .expect("delete tenant");
}
