//! Error types for the Genesis operator
//!
//! Errors carry the tenant and resource they concern so a failed reconcile
//! can be traced back to the object that caused it.

use thiserror::Error;

/// Main error type for Genesis operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Creating a derived resource failed for a reason other than "already exists"
    #[error("failed to create {kind} {name} for tenant {tenant}: {message}")]
    ResourceCreate {
        /// Tenant the resource belongs to
        tenant: String,
        /// Resource kind (Namespace, RoleBinding)
        kind: String,
        /// Resource name
        name: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Where the error occurred (e.g. "webhook", "startup")
        context: String,
    },
}

impl Error {
    /// Create a resource creation error
    pub fn resource_create(
        tenant: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::ResourceCreate {
            tenant: tenant.into(),
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Tenant this error concerns, if known
    pub fn tenant(&self) -> Option<&str> {
        match self {
            Error::ResourceCreate { tenant, .. } => Some(tenant),
            _ => None,
        }
    }

    /// Context of an internal error
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Short label used for the `error_type` metric attribute
    pub fn kind_label(&self) -> &'static str {
        match self {
            Error::Kube { .. } => "kube",
            Error::ResourceCreate { .. } => "resource_create",
            Error::Serialization { .. } => "serialization",
            Error::Internal { .. } => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}
