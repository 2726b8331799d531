//! Validation stage of the Tenant admission pipeline
//!
//! Checks run in a fixed order and the first failure decides the reason.

use kube::core::admission::Operation;
use serde_json::Value;

use super::AdmissionDecision;
use crate::crd::IsolationMode;

/// Run the validation stage on a raw Tenant document
pub fn validate_tenant(operation: &Operation, raw: &[u8]) -> AdmissionDecision {
    if matches!(operation, Operation::Delete) {
        return AdmissionDecision::allow("delete permitted");
    }

    if raw.is_empty() {
        return AdmissionDecision::deny("empty object");
    }

    let doc: Value = match serde_json::from_slice(raw) {
        Ok(doc) => doc,
        Err(e) => return AdmissionDecision::malformed(format!("invalid JSON: {}", e)),
    };

    match check_tenant(&doc) {
        Ok(_) => AdmissionDecision::allow("tenant validated"),
        Err(reason) => AdmissionDecision::deny(reason),
    }
}

/// Check the spec of a parsed Tenant document
///
/// Returns the isolation mode on success, or the first violated rule.
pub fn check_tenant(doc: &Value) -> Result<IsolationMode, String> {
    let spec = doc
        .get("spec")
        .and_then(Value::as_object)
        .ok_or("spec is required")?;

    match spec.get("displayName").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => {}
        _ => return Err("spec.displayName is required and must be non-empty".to_string()),
    }

    let isolation = spec
        .get("isolation")
        .and_then(Value::as_str)
        .ok_or("spec.isolation is required")?;

    isolation.parse::<IsolationMode>().map_err(|_| {
        let allowed: Vec<&str> = IsolationMode::ALL.iter().map(|m| m.as_str()).collect();
        format!("spec.isolation must be one of: {}", allowed.join(", "))
    })
}
