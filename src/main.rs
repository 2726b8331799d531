//! Genesis Operator - multi-tenant workspaces from Tenant resources

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::core::admission::Operation;
use kube::{Api, Client, CustomResourceExt, ResourceExt};

use genesis_operator::config::{ControllerArgs, TelemetryArgs};
use genesis_operator::controller::{self, Context};
use genesis_operator::crd::Tenant;
use genesis_operator::retry::{retry_with_backoff, RetryConfig};
use genesis_operator::telemetry::init_telemetry;
use genesis_operator::webhook::{self, AdmissionPipeline};
use genesis_operator::{crd_yaml, FIELD_MANAGER};

/// Genesis - provisions and governs multi-tenant workspaces
#[derive(Parser, Debug)]
#[command(name = "genesis-operator", version, about, long_about = None)]
struct Cli {
    /// Print the Tenant CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    telemetry: TelemetryArgs,

    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the tenant controller and the admission webhooks (default mode)
    Controller,

    /// Run a Tenant manifest through the admission pipeline and print the result
    ///
    /// Exits non-zero when the manifest would be rejected.
    Admit(AdmitArgs),
}

/// Admit mode arguments
#[derive(Parser, Debug)]
struct AdmitArgs {
    /// Path to a Tenant manifest (YAML or JSON)
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Admission operation to simulate
    #[arg(long, value_enum, default_value_t = AdmitOperation::Create)]
    operation: AdmitOperation,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AdmitOperation {
    Create,
    Update,
    Delete,
}

impl From<AdmitOperation> for Operation {
    fn from(op: AdmitOperation) -> Self {
        match op {
            AdmitOperation::Create => Operation::Create,
            AdmitOperation::Update => Operation::Update,
            AdmitOperation::Delete => Operation::Delete,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        println!("{}", crd_yaml()?);
        return Ok(());
    }

    init_telemetry(cli.telemetry.telemetry_config())?;

    match cli.command {
        Some(Commands::Admit(args)) => run_admit(args).await,
        Some(Commands::Controller) | None => run_controller(cli.controller).await,
    }
}

/// Run a manifest through defaulting and validation without a cluster
async fn run_admit(args: AdmitArgs) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {:?}: {}", args.file, e))?;

    // YAML is a superset of JSON, so both formats parse here
    let doc: serde_json::Value = serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {:?}: {}", args.file, e))?;
    let raw = serde_json::to_vec(&doc)?;

    let report = AdmissionPipeline.review(&args.operation.into(), &raw);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.allowed() {
        Ok(())
    } else {
        let (stage, decision) = report.final_decision();
        Err(anyhow::anyhow!(
            "Tenant rejected by {} stage: {}",
            stage,
            decision.reason()
        ))
    }
}

/// Install or update the Tenant CRD using server-side apply
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let crd = Tenant::crd();
    let name = crd.name_any();

    tracing::info!(crd = %name, "Installing Tenant CRD...");
    let (crds, params, crd, name) = (&crds, &params, &crd, name.as_str());
    retry_with_backoff(
        &RetryConfig::with_max_attempts(5),
        "install_tenant_crd",
        || async move { crds.patch(name, params, &Patch::Apply(crd)).await },
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install Tenant CRD: {}", e))?;

    tracing::info!("Tenant CRD installed/updated");
    Ok(())
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    tracing::info!("Genesis operator starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if args.install_crds {
        ensure_crd_installed(&client).await?;
    }

    let tls = args.tls()?;
    let ctx = Arc::new(
        Context::builder(client.clone())
            .resync_interval(args.resync_interval())
            .build(),
    );

    tracing::info!(
        webhook_addr = %args.webhook_addr,
        tls = tls.is_some(),
        concurrency = args.concurrency,
        resync_secs = args.resync_interval().as_secs(),
        "Starting admission webhooks and Tenant controller"
    );

    let webhooks = webhook::serve(args.webhook_addr, tls);
    let tenant_controller = controller::run(client, ctx, args.concurrency);

    tokio::select! {
        result = webhooks => {
            result?;
            tracing::info!("Webhook server stopped");
        }
        _ = tenant_controller => {
            tracing::info!("Tenant controller completed");
        }
    }

    tracing::info!("Genesis operator shutting down");
    Ok(())
}
