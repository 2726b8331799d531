//! Admission webhooks for Tenant resources
//!
//! Two endpoints guard every write to a Tenant: the mutating endpoint fills
//! in defaults and the validating endpoint rejects invalid specs. Both are
//! stateless, so handlers share nothing and may run concurrently.
//!
//! - `POST /mutate-tenant`: [`default_tenant`]
//! - `POST /validate-tenant`: [`validate_tenant`]
//! - `GET /healthz`: liveness probe

mod decision;
mod defaulting;
mod pipeline;
mod validation;

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
};
use tracing::{debug, error, info, warn};

pub use decision::AdmissionDecision;
pub use defaulting::{
    apply_defaults, default_tenant, DEFAULT_ESG_ENABLED, DEFAULT_ISOLATION, DEFAULT_QUOTA,
};
pub use pipeline::{AdmissionPipeline, AdmissionReport};
pub use validation::{check_tenant, validate_tenant};

use crate::{metrics, Error};

/// Path of the mutating webhook
pub const MUTATE_PATH: &str = "/mutate-tenant";
/// Path of the validating webhook
pub const VALIDATE_PATH: &str = "/validate-tenant";
/// Path of the liveness probe
pub const HEALTH_PATH: &str = "/healthz";

/// One of the two admission stages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Mutating stage that fills in defaults
    Defaulting,
    /// Validating stage that rejects invalid specs
    Validation,
}

impl Stage {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Defaulting => "defaulting",
            Stage::Validation => "validation",
        }
    }

    /// Run this stage against a raw object
    pub fn run(&self, operation: &Operation, raw: &[u8]) -> AdmissionDecision {
        match self {
            Stage::Defaulting => default_tenant(operation, raw),
            Stage::Validation => validate_tenant(operation, raw),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create the webhook router
pub fn webhook_router() -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate_handler))
        .route(VALIDATE_PATH, post(validate_handler))
        .route(HEALTH_PATH, get(|| async { "ok" }))
}

/// Handle a mutating admission review for a Tenant
pub async fn mutate_handler(
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(admit(body, Stage::Defaulting).into_review())
}

/// Handle a validating admission review for a Tenant
pub async fn validate_handler(
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(admit(body, Stage::Validation).into_review())
}

fn admit(body: AdmissionReview<DynamicObject>, stage: Stage) -> AdmissionResponse {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(stage = %stage, error = %e, "Failed to parse admission request");
            return AdmissionResponse::invalid(e.to_string());
        }
    };

    let start = Instant::now();
    let decision = match raw_object(&req) {
        Ok(raw) => stage.run(&req.operation, &raw),
        Err(e) => AdmissionDecision::internal(format!("failed to encode object: {}", e)),
    };

    match &decision {
        AdmissionDecision::Allow { patch, reason } => debug!(
            uid = %req.uid,
            stage = %stage,
            tenant = %req.name,
            patched = patch.is_some(),
            reason = %reason,
            "Admission allowed"
        ),
        AdmissionDecision::Deny { reason, code } => info!(
            uid = %req.uid,
            stage = %stage,
            tenant = %req.name,
            code = code,
            reason = %reason,
            "Admission denied"
        ),
        AdmissionDecision::Error { reason } => warn!(
            uid = %req.uid,
            stage = %stage,
            tenant = %req.name,
            reason = %reason,
            "Admission failed"
        ),
    }
    metrics::record_admission(stage.as_str(), decision.outcome_label(), start.elapsed());

    decision.into_response(&req)
}

/// Bytes of the submitted object; empty when the request carries none
fn raw_object(req: &AdmissionRequest<DynamicObject>) -> serde_json::Result<Vec<u8>> {
    match &req.object {
        Some(obj) => serde_json::to_vec(obj),
        None => Ok(Vec::new()),
    }
}

/// Certificate and key for serving the webhooks over TLS
#[derive(Clone, Debug)]
pub struct TlsFiles {
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
}

/// Serve the webhook router until the listener fails
///
/// Without TLS files the server speaks plain HTTP and expects TLS to be
/// terminated in front of it.
pub async fn serve(addr: SocketAddr, tls: Option<TlsFiles>) -> crate::Result<()> {
    let app = webhook_router();

    match tls {
        Some(tls) => {
            let config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(|e| {
                    Error::internal_with_context("webhook", format!("failed to load TLS config: {}", e))
                })?;
            info!(addr = %addr, "Starting admission webhook server (TLS)");
            axum_server::bind_rustls(addr, config)
                .serve(app.into_make_service())
                .await
                .map_err(|e| Error::internal_with_context("webhook", e.to_string()))
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                Error::internal_with_context("webhook", format!("failed to bind {}: {}", addr, e))
            })?;
            info!(addr = %addr, "Starting admission webhook server (plain HTTP)");
            axum::serve(listener, app)
                .await
                .map_err(|e| Error::internal_with_context("webhook", e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn review(operation: &str, object: Option<Value>) -> Value {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "0df28fbd-5f5f-11e8-bc74-36e6bb280816",
                "kind": {"group": "genesis.ai", "version": "v1", "kind": "Tenant"},
                "resource": {"group": "genesis.ai", "version": "v1", "resource": "tenants"},
                "name": "acme",
                "operation": operation,
                "userInfo": {"username": "alice"},
                "object": object,
                "dryRun": false
            }
        })
    }

    async fn post_review(path: &str, body: Value) -> Value {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = webhook_router().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    // =========================================================================
    // Endpoint Stories
    // =========================================================================

    /// Story: the mutating endpoint returns a JSONPatch for a minimal tenant
    #[tokio::test]
    async fn story_mutate_endpoint_patches_defaults() {
        let body = review(
            "CREATE",
            Some(json!({
                "apiVersion": "genesis.ai/v1",
                "kind": "Tenant",
                "metadata": {"name": "acme"},
                "spec": {"displayName": "Acme Corp"}
            })),
        );

        let out = post_review(MUTATE_PATH, body).await;
        let response = &out["response"];
        assert_eq!(response["uid"], "0df28fbd-5f5f-11e8-bc74-36e6bb280816");
        assert_eq!(response["allowed"], true);
        assert_eq!(response["patchType"], "JSONPatch");
        assert!(response["patch"].is_array());

        let bytes: Vec<u8> =
            serde_json::from_value(response["patch"].clone()).expect("patch bytes");
        let ops: Value = serde_json::from_slice(&bytes).expect("json patch");
        let paths: Vec<&str> = ops
            .as_array()
            .expect("op list")
            .iter()
            .filter_map(|op| op["path"].as_str())
            .collect();
        assert!(paths.contains(&"/spec/quota"));
        assert!(paths.contains(&"/spec/isolation"));
        assert!(paths.contains(&"/spec/esgEnabled"));
    }

    /// Story: the validating endpoint rejects an unknown isolation mode
    #[tokio::test]
    async fn story_validate_endpoint_rejects_bad_isolation() {
        let body = review(
            "UPDATE",
            Some(json!({
                "apiVersion": "genesis.ai/v1",
                "kind": "Tenant",
                "metadata": {"name": "acme"},
                "spec": {"displayName": "Acme Corp", "isolation": "global"}
            })),
        );

        let out = post_review(VALIDATE_PATH, body).await;
        let response = &out["response"];
        assert_eq!(response["allowed"], false);
        assert_eq!(response["status"]["code"], 403);
        assert_eq!(
            response["status"]["message"],
            "spec.isolation must be one of: namespace, cluster, network"
        );
    }

    #[tokio::test]
    async fn validate_endpoint_allows_delete() {
        let out = post_review(VALIDATE_PATH, review("DELETE", None)).await;
        assert_eq!(out["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn validate_endpoint_rejects_missing_object() {
        let out = post_review(VALIDATE_PATH, review("CREATE", None)).await;
        assert_eq!(out["response"]["allowed"], false);
        assert_eq!(out["response"]["status"]["message"], "empty object");
    }

    #[tokio::test]
    async fn review_without_request_is_invalid() {
        let body = json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"});
        let out = post_review(MUTATE_PATH, body).await;
        assert_eq!(out["response"]["allowed"], false);
    }

    #[tokio::test]
    async fn healthz_responds() {
        let request = Request::builder()
            .uri(HEALTH_PATH)
            .body(Body::empty())
            .expect("request");
        let response = webhook_router().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn stage_labels() {
        assert_eq!(Stage::Defaulting.to_string(), "defaulting");
        assert_eq!(Stage::Validation.as_str(), "validation");
    }
}
