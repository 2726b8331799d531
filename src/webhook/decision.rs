//! Admission decisions and their mapping onto `AdmissionResponse`

use json_patch::Patch;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::Status;
use serde::Serialize;
use tracing::error;

/// Status code for a policy rejection
pub const CODE_FORBIDDEN: u16 = 403;
/// Status code for a body that could not be parsed
pub const CODE_BAD_REQUEST: u16 = 400;
/// Status code for a failure inside the webhook itself
pub const CODE_INTERNAL: u16 = 500;

/// Outcome of one admission stage
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum AdmissionDecision {
    /// The object may be persisted, optionally after applying `patch`
    Allow {
        /// Human-readable reason
        reason: String,
        /// JSON patch to apply before persistence
        #[serde(skip_serializing_if = "Option::is_none")]
        patch: Option<Patch>,
    },
    /// The object is rejected
    Deny {
        /// Human-readable reason, never empty
        reason: String,
        /// 403 for policy violations, 400 for malformed input
        code: u16,
    },
    /// The webhook failed to reach a decision
    Error {
        /// What went wrong
        reason: String,
    },
}

impl AdmissionDecision {
    /// Allow without mutation
    pub fn allow(reason: impl Into<String>) -> Self {
        Self::Allow {
            reason: reason.into(),
            patch: None,
        }
    }

    /// Allow with a patch; an empty patch collapses to a plain allow
    pub fn allow_with_patch(reason: impl Into<String>, patch: Patch) -> Self {
        Self::Allow {
            reason: reason.into(),
            patch: (!patch.0.is_empty()).then_some(patch),
        }
    }

    /// Reject for a policy violation
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
            code: CODE_FORBIDDEN,
        }
    }

    /// Reject input that could not be parsed
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
            code: CODE_BAD_REQUEST,
        }
    }

    /// Internal failure, distinct from a rejection
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    /// Whether the object may be persisted
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// Human-readable reason
    pub fn reason(&self) -> &str {
        match self {
            Self::Allow { reason, .. } | Self::Deny { reason, .. } | Self::Error { reason } => {
                reason
            }
        }
    }

    /// Patch carried by an allow decision
    pub fn patch(&self) -> Option<&Patch> {
        match self {
            Self::Allow { patch, .. } => patch.as_ref(),
            _ => None,
        }
    }

    /// Status code reported in the admission response
    pub fn code(&self) -> u16 {
        match self {
            Self::Allow { .. } => 200,
            Self::Deny { code, .. } => *code,
            Self::Error { .. } => CODE_INTERNAL,
        }
    }

    /// Label used for the `outcome` metric attribute
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Allow { patch: Some(_), .. } => "patched",
            Self::Allow { patch: None, .. } => "allowed",
            Self::Deny { .. } => "denied",
            Self::Error { .. } => "error",
        }
    }

    /// Build the response for `req`
    pub fn into_response(self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let base = AdmissionResponse::from(req);
        match self {
            Self::Allow { reason, patch } => {
                let mut response = match patch {
                    Some(patch) => match base.with_patch(patch) {
                        Ok(response) => response,
                        Err(e) => {
                            error!(uid = %req.uid, error = %e, "Failed to serialize admission patch");
                            return Self::internal(format!("patch serialization error: {}", e))
                                .into_response(req);
                        }
                    },
                    None => base,
                };
                response.result.code = 200;
                response.result.message = reason;
                response
            }
            Self::Deny { reason, code } => {
                let mut response = base.deny(reason.clone());
                response.result = Status::failure(&reason, status_reason(code)).with_code(code);
                response
            }
            Self::Error { reason } => {
                let mut response = base.deny(reason.clone());
                response.result = Status::failure(&reason, status_reason(CODE_INTERNAL))
                    .with_code(CODE_INTERNAL);
                response
            }
        }
    }
}

fn status_reason(code: u16) -> &'static str {
    match code {
        CODE_BAD_REQUEST => "BadRequest",
        CODE_FORBIDDEN => "Forbidden",
        _ => "InternalError",
    }
}
