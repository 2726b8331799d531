//! Tenant controller implementation
//!
//! Reconciliation is level-triggered: whatever caused a trigger, the
//! controller re-reads the Tenant and converges toward the same end state.
//! Every step only creates what is missing, so repeating a reconcile is
//! harmless and a partially failed one resumes where it stopped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument};

#[cfg(test)]
use mockall::automock;

use super::resources::{tenant_admin_binding, tenant_namespace};
use crate::crd::{Tenant, TenantStatus};
use crate::metrics::ReconcileTimer;
use crate::retry::RetryConfig;
use crate::{Error, FIELD_MANAGER};

/// Default interval between re-checks of a converged tenant
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Result of a create call against the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The object was created by this call
    Created,
    /// An object with the same name was already present
    AlreadyExists,
}

/// Trait abstracting the cluster operations the tenant controller needs
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TenantClient: Send + Sync {
    /// Fetch a Tenant by name, `None` if it does not exist
    async fn get_tenant(&self, name: &str) -> Result<Option<Tenant>, Error>;

    /// Create the namespace for `tenant`
    async fn create_namespace(
        &self,
        tenant: &str,
        namespace: &Namespace,
    ) -> Result<CreateOutcome, Error>;

    /// Create a RoleBinding inside a tenant namespace
    async fn create_role_binding(
        &self,
        tenant: &str,
        binding: &RoleBinding,
    ) -> Result<CreateOutcome, Error>;

    /// Merge-patch the status of a Tenant
    async fn patch_status(&self, name: &str, status: &TenantStatus) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeTenantClient {
    client: Client,
}

impl KubeTenantClient {
    /// Create a new KubeTenantClient wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

/// Map a create result, treating a 409 Conflict as "already exists"
fn create_outcome<T>(
    result: Result<T, kube::Error>,
    tenant: &str,
    kind: &str,
    name: &str,
) -> Result<CreateOutcome, Error> {
    match result {
        Ok(_) => Ok(CreateOutcome::Created),
        Err(kube::Error::Api(e)) if e.code == 409 => Ok(CreateOutcome::AlreadyExists),
        Err(e) => Err(Error::resource_create(tenant, kind, name, e.to_string())),
    }
}

#[async_trait]
impl TenantClient for KubeTenantClient {
    async fn get_tenant(&self, name: &str) -> Result<Option<Tenant>, Error> {
        let api: Api<Tenant> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_namespace(
        &self,
        tenant: &str,
        namespace: &Namespace,
    ) -> Result<CreateOutcome, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let name = namespace.name_any();
        let result = api.create(&Self::post_params(), namespace).await;
        create_outcome(result, tenant, "Namespace", &name)
    }

    async fn create_role_binding(
        &self,
        tenant: &str,
        binding: &RoleBinding,
    ) -> Result<CreateOutcome, Error> {
        let namespace = binding.namespace().ok_or_else(|| {
            Error::resource_create(
                tenant,
                "RoleBinding",
                binding.name_any(),
                "binding has no namespace",
            )
        })?;
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), &namespace);
        let name = binding.name_any();
        let result = api.create(&Self::post_params(), binding).await;
        create_outcome(result, tenant, "RoleBinding", &name)
    }

    async fn patch_status(&self, name: &str, status: &TenantStatus) -> Result<(), Error> {
        let api: Api<Tenant> = Api::all(self.client.clone());

        let status_patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}

/// Controller context shared across reconciles
pub struct Context {
    /// Cluster access (trait object for testability)
    pub client: Arc<dyn TenantClient>,
    /// Delay before a converged tenant is checked again
    pub resync_interval: Duration,
    /// Backoff curve for failed reconciles
    pub retry: RetryConfig,
    /// Consecutive failures per tenant name
    failures: DashMap<String, u32>,
}

impl Context {
    /// Create a builder backed by a real Kubernetes client
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(Arc::new(KubeTenantClient::new(client)))
    }

    /// Create a builder backed by any [`TenantClient`]
    pub fn builder_with(client: Arc<dyn TenantClient>) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Consecutive failures recorded for `tenant`
    pub fn failure_count(&self, tenant: &str) -> u32 {
        self.failures.get(tenant).map(|n| *n).unwrap_or(0)
    }

    fn record_failure(&self, tenant: &str) -> u32 {
        let mut count = self.failures.entry(tenant.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Drop the backoff state kept for `tenant`
    ///
    /// Called on every successful reconcile and when the watch reports the
    /// Tenant deleted, since a deleted Tenant is never reconciled again.
    pub fn forget_tenant(&self, tenant: &str) {
        self.failures.remove(tenant);
    }
}

/// Builder for constructing [`Context`] instances
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .resync_interval(Duration::from_secs(60))
///     .build();
/// ```
pub struct ContextBuilder {
    client: Arc<dyn TenantClient>,
    resync_interval: Duration,
    retry: RetryConfig,
}

impl ContextBuilder {
    fn new(client: Arc<dyn TenantClient>) -> Self {
        Self {
            client,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            retry: RetryConfig::default(),
        }
    }

    /// Set the periodic resync interval
    pub fn resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Set the backoff curve used by the error policy
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        Context {
            client: self.client,
            resync_interval: self.resync_interval,
            retry: self.retry,
            failures: DashMap::new(),
        }
    }
}

/// What a single reconcile found and did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Namespace and binding are in place and status records the namespace
    Converged {
        /// The tenant namespace
        namespace: String,
        /// Whether this pass created the namespace
        created_namespace: bool,
        /// Whether this pass created the binding
        created_binding: bool,
        /// Whether this pass wrote status
        status_updated: bool,
    },
    /// The tenant no longer exists
    NotFound,
    /// The tenant is being deleted; garbage collection handles the rest
    Deleting,
}

/// Reconcile a Tenant resource
///
/// The object handed over by the watch is only used for its name; the
/// tenant is re-read so a stale trigger cannot act on outdated state.
#[instrument(skip(tenant, ctx), fields(tenant = %tenant.name_any()))]
pub async fn reconcile(tenant: Arc<Tenant>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = tenant.name_any();
    let timer = ReconcileTimer::start(&name);

    match reconcile_tenant(&name, &ctx).await {
        Ok(outcome) => {
            timer.success();
            ctx.forget_tenant(&name);
            debug!(?outcome, "reconcile finished");
            match outcome {
                ReconcileOutcome::Converged { .. } => Ok(Action::requeue(ctx.resync_interval)),
                ReconcileOutcome::NotFound | ReconcileOutcome::Deleting => {
                    Ok(Action::await_change())
                }
            }
        }
        Err(e) => {
            timer.error(e.kind_label());
            Err(e)
        }
    }
}

/// Converge the tenant with the given name
pub async fn reconcile_tenant(name: &str, ctx: &Context) -> Result<ReconcileOutcome, Error> {
    let Some(tenant) = ctx.client.get_tenant(name).await? else {
        debug!("tenant not found, nothing to do");
        return Ok(ReconcileOutcome::NotFound);
    };

    if tenant.is_deleting() {
        debug!("tenant is being deleted, leaving cleanup to garbage collection");
        return Ok(ReconcileOutcome::Deleting);
    }

    let namespace = tenant_namespace(&tenant);
    let ns_name = tenant.namespace_name();
    let created_namespace = match ctx.client.create_namespace(name, &namespace).await? {
        CreateOutcome::Created => {
            info!(namespace = %ns_name, "created tenant namespace");
            true
        }
        CreateOutcome::AlreadyExists => {
            debug!(namespace = %ns_name, "tenant namespace already exists");
            false
        }
    };

    let binding = tenant_admin_binding(&tenant);
    let created_binding = match ctx.client.create_role_binding(name, &binding).await? {
        CreateOutcome::Created => {
            info!(namespace = %ns_name, group = %tenant.admin_group(), "created tenant admin binding");
            true
        }
        CreateOutcome::AlreadyExists => false,
    };

    let status_updated = if tenant.recorded_namespace() != Some(ns_name.as_str()) {
        ctx.client
            .patch_status(name, &TenantStatus::with_namespace(&ns_name))
            .await?;
        info!(namespace = %ns_name, "recorded tenant namespace in status");
        true
    } else {
        false
    };

    Ok(ReconcileOutcome::Converged {
        namespace: ns_name,
        created_namespace,
        created_binding,
        status_updated,
    })
}

/// Error policy for the tenant controller
///
/// Every failure is retried. The delay grows with consecutive failures of
/// the same tenant and is reset by the next successful reconcile.
pub fn error_policy(tenant: Arc<Tenant>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = tenant.name_any();
    let attempt = ctx.record_failure(&name);
    let delay = ctx.retry.jittered_delay(attempt);

    error!(
        ?error,
        tenant = %name,
        attempt,
        retry_in_ms = delay.as_millis() as u64,
        "reconciliation failed"
    );

    Action::requeue(delay)
}
