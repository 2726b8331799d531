//! Live-cluster stories
//!
//! - `tenant_lifecycle`: a Tenant is created, reconciled into a namespace and
//!   admin binding, reconciled again without change, and deleted

mod tenant_lifecycle;
