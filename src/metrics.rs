//! Metrics for Genesis operator observability
//!
//! Provides OpenTelemetry metrics for:
//! - Tenant reconciliation (duration, errors)
//! - Admission decisions (counts and latency per stage)
//!
//! Instruments are no-ops until a meter provider is installed by
//! [`crate::telemetry::init_telemetry`].

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

/// Global meter for Genesis metrics
static METER: Lazy<Meter> = Lazy::new(|| global::meter("genesis-operator"));

// ============================================================================
// Tenant Reconciliation Metrics
// ============================================================================

/// Histogram of tenant reconciliation duration
///
/// Labels:
/// - `tenant`: tenant name
/// - `result`: success, error
pub static TENANT_RECONCILE_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("genesis_tenant_reconcile_duration_seconds")
        .with_description("Duration of tenant reconciliation in seconds")
        .with_unit("s")
        .build()
});

/// Counter of tenant reconciliation errors
///
/// Labels:
/// - `tenant`: tenant name
/// - `error_type`: kube, resource_create, serialization, internal
pub static TENANT_RECONCILE_ERRORS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("genesis_tenant_reconcile_errors_total")
        .with_description("Total number of tenant reconciliation errors")
        .with_unit("{errors}")
        .build()
});

// ============================================================================
// Admission Metrics
// ============================================================================

/// Counter of admission decisions
///
/// Labels:
/// - `stage`: defaulting, validation
/// - `outcome`: allowed, patched, denied, error
pub static ADMISSION_DECISIONS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("genesis_admission_decisions_total")
        .with_description("Total number of Tenant admission decisions")
        .with_unit("{decisions}")
        .build()
});

/// Histogram of admission handling latency
///
/// Labels:
/// - `stage`: defaulting, validation
pub static ADMISSION_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("genesis_admission_duration_seconds")
        .with_description("Duration of Tenant admission handling in seconds")
        .with_unit("s")
        .build()
});

// ============================================================================
// Metric Recording Helpers
// ============================================================================

/// Record a tenant reconciliation with timing
pub struct ReconcileTimer {
    tenant: String,
    start: Instant,
}

impl ReconcileTimer {
    /// Start timing a reconciliation
    pub fn start(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            start: Instant::now(),
        }
    }

    /// Record successful completion
    pub fn success(self) {
        let duration = self.start.elapsed().as_secs_f64();
        TENANT_RECONCILE_DURATION.record(
            duration,
            &[
                KeyValue::new("tenant", self.tenant),
                KeyValue::new("result", "success"),
            ],
        );
    }

    /// Record error completion
    pub fn error(self, error_type: &str) {
        let duration = self.start.elapsed().as_secs_f64();
        TENANT_RECONCILE_DURATION.record(
            duration,
            &[
                KeyValue::new("tenant", self.tenant.clone()),
                KeyValue::new("result", "error"),
            ],
        );
        TENANT_RECONCILE_ERRORS.add(
            1,
            &[
                KeyValue::new("tenant", self.tenant),
                KeyValue::new("error_type", error_type.to_string()),
            ],
        );
    }
}

/// Record one admission decision
pub fn record_admission(stage: &'static str, outcome: &'static str, elapsed: Duration) {
    ADMISSION_DECISIONS.add(
        1,
        &[
            KeyValue::new("stage", stage),
            KeyValue::new("outcome", outcome),
        ],
    );
    ADMISSION_DURATION.record(elapsed.as_secs_f64(), &[KeyValue::new("stage", stage)]);
}
