//! Controller for Tenant resources
//!
//! Watches Tenants (and the namespaces they own) and converges each one
//! toward its namespace and admin RoleBinding. The kube-runtime controller
//! queue guarantees at most one reconcile per tenant at a time and coalesces
//! triggers that arrive while a reconcile is running.

mod resources;
mod tenant;

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::controller::{self, Action};
use kube::runtime::reflector::{self, ObjectRef};
use kube::runtime::watcher::{self, watcher, Config as WatcherConfig};
use kube::runtime::{Controller, WatchStreamExt};
use kube::{Api, Client, ResourceExt};

pub use resources::{
    tenant_admin_binding, tenant_namespace, tenant_namespace_labels, ADMIN_CLUSTER_ROLE,
    POD_SECURITY_LEVEL, TENANT_ADMIN_BINDING,
};
pub use tenant::{
    error_policy, reconcile, reconcile_tenant, Context, ContextBuilder, CreateOutcome,
    KubeTenantClient, ReconcileOutcome, TenantClient, DEFAULT_RESYNC_INTERVAL,
};

use crate::crd::Tenant;
use crate::{MANAGED_BY_LABEL, MANAGED_BY_VALUE};

/// Run the Tenant controller until a shutdown signal arrives
pub async fn run(client: Client, ctx: Arc<Context>, concurrency: u16) {
    let tenants: Api<Tenant> = Api::all(client.clone());
    let namespaces: Api<Namespace> = Api::all(client);
    let managed = format!("{}={}", MANAGED_BY_LABEL, MANAGED_BY_VALUE);

    // Deleted tenants never reach reconcile, so their backoff state is
    // dropped straight from the watch stream
    let (reader, writer) = reflector::store();
    let forget = ctx.clone();
    let trigger = watcher(tenants, WatcherConfig::default())
        .default_backoff()
        .reflect(writer)
        .inspect_ok(move |event| forget_deleted(&forget, event))
        .applied_objects();

    Controller::for_stream(trigger, reader)
        .owns(namespaces, WatcherConfig::default().labels(&managed))
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move { log_reconcile_result(result) })
        .await;
}

fn forget_deleted(ctx: &Context, event: &watcher::Event<Tenant>) {
    if let watcher::Event::Delete(tenant) = event {
        let name = tenant.name_any();
        tracing::debug!(tenant = %name, "Tenant deleted, dropping backoff state");
        ctx.forget_tenant(&name);
    }
}

fn log_reconcile_result<E: std::fmt::Debug>(
    result: Result<(ObjectRef<Tenant>, Action), E>,
) {
    match result {
        Ok((obj, action)) => {
            tracing::debug!(tenant = %obj.name, ?action, "Tenant reconciliation completed");
        }
        Err(e) => {
            tracing::error!(error = ?e, "Tenant reconciliation error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tenant::MockTenantClient;
    use super::*;
    use crate::crd::{IsolationMode, TenantSpec};
    use crate::Error;

    fn tenant(name: &str) -> Tenant {
        Tenant::new(
            name,
            TenantSpec {
                display_name: "Acme Corp".to_string(),
                quota: None,
                oidc_group: None,
                isolation: IsolationMode::Namespace,
                esg_enabled: None,
                compliance_frameworks: None,
            },
        )
    }

    fn failing_ctx() -> Arc<Context> {
        let ctx = Arc::new(Context::builder_with(Arc::new(MockTenantClient::new())).build());
        let err = Error::serialization("boom");
        error_policy(Arc::new(tenant("acme")), &err, ctx.clone());
        error_policy(Arc::new(tenant("globex")), &err, ctx.clone());
        ctx
    }

    /// Story: a tenant deleted while failing does not leave backoff state behind
    #[test]
    fn story_delete_event_drops_backoff_state() {
        let ctx = failing_ctx();
        assert_eq!(ctx.failure_count("acme"), 1);

        forget_deleted(&ctx, &watcher::Event::Delete(tenant("acme")));

        assert_eq!(ctx.failure_count("acme"), 0);
        assert_eq!(ctx.failure_count("globex"), 1);
    }

    #[test]
    fn apply_events_keep_backoff_state() {
        let ctx = failing_ctx();
        forget_deleted(&ctx, &watcher::Event::Apply(tenant("acme")));
        forget_deleted(&ctx, &watcher::Event::InitApply(tenant("acme")));
        assert_eq!(ctx.failure_count("acme"), 1);
    }
}
