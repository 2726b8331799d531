//! Offline run of both admission stages
//!
//! The API server calls the two webhooks separately. This module chains them
//! the same way (defaults first, then validation of the defaulted object) for
//! the `admit` command and for tests.

use kube::core::admission::Operation;
use serde::Serialize;
use serde_json::Value;

use super::{default_tenant, validate_tenant, AdmissionDecision, Stage};

/// Result of running a Tenant document through the pipeline
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReport {
    /// Decision of the defaulting stage
    pub defaulting: AdmissionDecision,
    /// Decision of the validation stage; absent when defaulting stopped the pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<AdmissionDecision>,
    /// The document as it would be persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

impl AdmissionReport {
    /// Whether the document would be persisted
    pub fn allowed(&self) -> bool {
        self.defaulting.is_allowed()
            && self
                .validation
                .as_ref()
                .is_some_and(AdmissionDecision::is_allowed)
    }

    /// The decision that settled the outcome
    pub fn final_decision(&self) -> (Stage, &AdmissionDecision) {
        match &self.validation {
            Some(validation) => (Stage::Validation, validation),
            None => (Stage::Defaulting, &self.defaulting),
        }
    }
}

/// Mutate-then-validate gate for Tenant documents
#[derive(Clone, Copy, Debug, Default)]
pub struct AdmissionPipeline;

impl AdmissionPipeline {
    /// Run `raw` through defaulting, apply the resulting patch, then validate
    pub fn review(&self, operation: &Operation, raw: &[u8]) -> AdmissionReport {
        let defaulting = default_tenant(operation, raw);
        if !defaulting.is_allowed() {
            return AdmissionReport {
                defaulting,
                validation: None,
                object: None,
            };
        }

        let mut object: Option<Value> = serde_json::from_slice(raw).ok();
        if let (Some(doc), Some(patch)) = (object.as_mut(), defaulting.patch()) {
            if let Err(e) = json_patch::patch(doc, &patch.0) {
                return AdmissionReport {
                    defaulting: AdmissionDecision::internal(format!(
                        "failed to apply defaults: {}",
                        e
                    )),
                    validation: None,
                    object: None,
                };
            }
        }

        let validated = match &object {
            Some(doc) => match serde_json::to_vec(doc) {
                Ok(bytes) => validate_tenant(operation, &bytes),
                Err(e) => AdmissionDecision::internal(format!("failed to encode object: {}", e)),
            },
            None => validate_tenant(operation, raw),
        };

        AdmissionReport {
            defaulting,
            validation: Some(validated),
            object,
        }
    }
}
