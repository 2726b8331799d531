//! Defaulting stage of the Tenant admission pipeline
//!
//! Fills in optional spec fields that were omitted. Defaulting is additive
//! only: a spec field that is present, even as `null` or `false`, is never touched.

use kube::core::admission::Operation;
use serde_json::{Map, Value};

use super::AdmissionDecision;
use crate::crd::IsolationMode;

/// Quota assigned when `spec.quota` is omitted
pub const DEFAULT_QUOTA: &str = "medium";

/// Isolation mode assigned when `spec.isolation` is omitted
pub const DEFAULT_ISOLATION: IsolationMode = IsolationMode::Namespace;

/// ESG flag assigned when `spec.esgEnabled` is omitted
pub const DEFAULT_ESG_ENABLED: bool = false;

fn spec_defaults() -> [(&'static str, Value); 3] {
    [
        ("quota", Value::from(DEFAULT_QUOTA)),
        ("isolation", Value::from(DEFAULT_ISOLATION.as_str())),
        ("esgEnabled", Value::from(DEFAULT_ESG_ENABLED)),
    ]
}

/// Run the defaulting stage on a raw Tenant document
pub fn default_tenant(operation: &Operation, raw: &[u8]) -> AdmissionDecision {
    if matches!(operation, Operation::Delete) {
        return AdmissionDecision::allow("delete permitted");
    }

    let original: Value = match serde_json::from_slice(raw) {
        Ok(doc) => doc,
        Err(e) => return AdmissionDecision::malformed(format!("invalid JSON: {}", e)),
    };

    let mut mutated = original.clone();
    let applied = apply_defaults(&mut mutated);
    if applied.is_empty() {
        return AdmissionDecision::allow("no defaults applied");
    }

    let patch = json_patch::diff(&original, &mutated);
    AdmissionDecision::allow_with_patch(format!("defaulted {}", applied.join(", ")), patch)
}

/// Apply spec defaults in place, returning the names of the fields set
///
/// A document that is not an object is left unchanged. A `spec` that is
/// missing or not an object (`null`, a string, a list) becomes an empty
/// object, so validation reports the missing required fields.
pub fn apply_defaults(doc: &mut Value) -> Vec<&'static str> {
    let Some(obj) = doc.as_object_mut() else {
        return Vec::new();
    };

    let mut applied = Vec::new();
    let spec = obj.entry("spec").or_insert(Value::Null);
    if !spec.is_object() {
        *spec = Value::Object(Map::new());
        applied.push("spec");
    }

    let Some(spec) = spec.as_object_mut() else {
        return applied;
    };

    for (field, value) in spec_defaults() {
        if !spec.contains_key(field) {
            spec.insert(field.to_string(), value);
            applied.push(field);
        }
    }
    applied
}
