//! Operator configuration
//!
//! Every setting is a command-line flag that can also be supplied through an
//! environment variable, so the same binary runs unchanged from a Deployment
//! manifest or a developer shell.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args};

use crate::telemetry::{LogFormat, TelemetryConfig};
use crate::webhook::TlsFiles;
use crate::{Error, DEFAULT_WEBHOOK_PORT};

/// Default interval between periodic re-checks of a healthy tenant
pub const DEFAULT_RESYNC_SECS: u64 = 300;

/// Default number of tenants reconciled in parallel
pub const DEFAULT_CONCURRENCY: u16 = 4;

/// Logging and export settings shared by every command
#[derive(Args, Clone, Debug)]
pub struct TelemetryArgs {
    /// Log line format
    #[arg(
        long,
        global = true,
        env = "GENESIS_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Json
    )]
    pub log_format: LogFormat,

    /// OTLP collector endpoint for traces and metrics
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl TelemetryArgs {
    /// Telemetry configuration for this process
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            otlp_endpoint: self.otlp_endpoint.clone(),
            log_format: self.log_format,
            ..TelemetryConfig::default()
        }
    }
}

/// Settings for controller mode
#[derive(Args, Clone, Debug)]
pub struct ControllerArgs {
    /// Address the admission webhook server listens on
    #[arg(
        long,
        env = "GENESIS_WEBHOOK_ADDR",
        default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_WEBHOOK_PORT))
    )]
    pub webhook_addr: SocketAddr,

    /// PEM certificate for the webhook server (plain HTTP when unset)
    #[arg(long, env = "GENESIS_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for the webhook server
    #[arg(long, env = "GENESIS_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Seconds between periodic re-checks of each tenant
    #[arg(long, env = "GENESIS_RESYNC_SECS", default_value_t = DEFAULT_RESYNC_SECS)]
    pub resync_secs: u64,

    /// Maximum number of tenants reconciled in parallel
    #[arg(long, env = "GENESIS_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: u16,

    /// Install or update the Tenant CRD on startup
    #[arg(
        long,
        env = "GENESIS_INSTALL_CRDS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub install_crds: bool,
}

impl Default for ControllerArgs {
    fn default() -> Self {
        Self {
            webhook_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_WEBHOOK_PORT)),
            tls_cert: None,
            tls_key: None,
            resync_secs: DEFAULT_RESYNC_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            install_crds: true,
        }
    }
}

impl ControllerArgs {
    /// Interval after which a successfully reconciled tenant is checked again
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs.max(1))
    }

    /// TLS files for the webhook server, if configured
    pub fn tls(&self) -> crate::Result<Option<TlsFiles>> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Ok(Some(TlsFiles {
                cert_path: cert.clone(),
                key_path: key.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(Error::internal_with_context(
                "config",
                "TLS certificate and key must be set together",
            )),
        }
    }
}
