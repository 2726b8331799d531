//! Genesis - Kubernetes operator for multi-tenant workspaces
//!
//! Genesis turns declarative `Tenant` objects into isolated workspaces on a
//! shared cluster. Two parts cooperate:
//!
//! - An admission pipeline guards every write to a Tenant: a mutating stage
//!   fills in defaults, then a validating stage rejects invalid specs.
//! - A level-triggered controller converges each Tenant toward a namespace
//!   and an admin RoleBinding, and records the namespace in status.
//!
//! Every derived name is a pure function of the tenant name, which is what
//! makes repeated reconciles safe.
//!
//! # Modules
//!
//! - [`crd`] - The Tenant Custom Resource Definition
//! - [`webhook`] - Defaulting and validation admission stages and their HTTP server
//! - [`controller`] - Tenant reconciliation logic
//! - [`config`] - Command-line and environment configuration
//! - [`telemetry`] - Logging, tracing and metrics export setup
//! - [`metrics`] - OpenTelemetry instruments
//! - [`retry`] - Exponential backoff with jitter
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod telemetry;
pub mod webhook;

use kube::CustomResourceExt;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Naming and Labeling Constants
// =============================================================================

/// Prefix of every tenant namespace (`tenant-<name>`)
pub const TENANT_NAMESPACE_PREFIX: &str = "tenant-";

/// Label carrying the owning tenant's name
pub const TENANT_LABEL: &str = "genesis.ai/tenant";

/// Label marking objects managed by this operator
pub const MANAGED_BY_LABEL: &str = "genesis.ai/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY_VALUE: &str = "genesis-operator";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "genesis-operator";

/// Default port for the admission webhook server
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;

/// Tenant CRD rendered as YAML
pub fn crd_yaml() -> Result<String> {
    serde_yaml::to_string(&crd::Tenant::crd())
        .map_err(|e| Error::serialization_for_kind("CustomResourceDefinition", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crd_is_cluster_scoped_with_status() {
        let yaml = crd_yaml().expect("render crd");
        assert!(yaml.contains("name: tenants.genesis.ai"));
        assert!(yaml.contains("scope: Cluster"));
        assert!(yaml.contains("status: {}"));
        assert!(yaml.contains("kind: Tenant"));
    }
}
