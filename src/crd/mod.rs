//! Custom Resource Definitions for the Genesis operator
//!
//! The Tenant CRD is the shared vocabulary of the admission webhooks and the
//! tenant controller.

mod tenant;

pub use tenant::{
    tenant_admin_group, tenant_namespace_name, IsolationMode, Tenant, TenantList, TenantSpec,
    TenantStatus,
};
