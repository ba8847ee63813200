use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kube::config::Kubeconfig;
use meshsync_controller::broadcast::MessageType;
use meshsync_controller::broker::MemoryBroker;
use meshsync_controller::controller::{ConnectionRegistry, ControllerConfig, SyncController};
use meshsync_controller::model::{K8sContext, RequestContext, ResyncActions};
use meshsync_controller::operator::KubeOperatorFactory;
use meshsync_controller::persist::{MemoryPersister, PgPersister, Persister, StaticProvider};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller
    Run(RunArgs),
    /// Clear discovery data and/or request a MeshSync rediscovery
    Resync(ResyncArgs),
    /// Show version information
    Version,
}

#[derive(Args, Debug)]
struct ClusterArgs {
    /// Kubeconfig file; defaults to the standard kubeconfig lookup
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Contexts to manage; all contexts when empty
    #[arg(long = "context", env = "MESHSYNC_CONTEXTS", value_delimiter = ',')]
    contexts: Vec<String>,

    /// Namespace the Meshery operator runs in
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = "meshery")]
    operator_namespace: String,

    /// Postgres URL for discovery data; data is kept in memory when unset
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    database_max_connections: u32,

    /// Seconds between broker endpoint lookups
    #[arg(long, env = "BROKER_WAIT_INTERVAL", default_value_t = 1)]
    broker_wait_interval: u64,

    /// Broker endpoint lookups before giving up on a context
    #[arg(long, env = "BROKER_WAIT_ATTEMPTS", default_value_t = 60)]
    broker_wait_attempts: u32,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    cluster: ClusterArgs,

    /// Seconds between MeshSync status polls
    #[arg(long, env = "MESHSYNC_POLL_INTERVAL", default_value_t = 10)]
    poll_interval: u64,

    /// Envelopes buffered on the broadcast bus per slow listener
    #[arg(long, env = "BUS_CAPACITY", default_value_t = 256)]
    bus_capacity: usize,

    /// Address for the health, metrics and connections API
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,
}

#[derive(Parser, Debug)]
struct ResyncArgs {
    #[command(flatten)]
    cluster: ClusterArgs,

    /// Drop and recreate the discovery tables
    #[arg(long)]
    clear_db: bool,

    /// Ask MeshSync to rediscover the cluster
    #[arg(long)]
    re_sync: bool,

    /// Keep going when dropping or creating tables fails
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("MeshSync Controller v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Run(run_args) => {
            init_tracing();
            let result = run_controller(run_args).await;
            meshsync_controller::telemetry::shutdown_telemetry();
            result
        }
        Commands::Resync(resync_args) => {
            init_tracing();
            run_resync(resync_args).await
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let fmt_layer = fmt::layer().with_target(true);

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    let otel_enabled = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok();

    if otel_enabled {
        let otel_layer = meshsync_controller::telemetry::init_telemetry(&registry);
        registry.with(otel_layer).init();
        info!("OpenTelemetry tracing initialized");
    } else {
        registry.init();
        info!("OpenTelemetry tracing disabled (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
    }
}

async fn load_contexts(args: &ClusterArgs) -> anyhow::Result<Vec<K8sContext>> {
    let contexts = match &args.kubeconfig {
        Some(path) => K8sContext::load_from_path(path, &args.contexts)
            .await
            .with_context(|| format!("loading kubeconfig {}", path.display()))?,
        None => {
            let kubeconfig = Kubeconfig::read().context("reading default kubeconfig")?;
            K8sContext::load_all(&kubeconfig, &args.contexts).await?
        }
    };
    if contexts.is_empty() {
        anyhow::bail!("no Kubernetes contexts matched {:?}", args.contexts);
    }
    Ok(contexts)
}

async fn build_persister(args: &ClusterArgs) -> anyhow::Result<Arc<dyn Persister>> {
    match &args.database_url {
        Some(url) => {
            let persister = PgPersister::connect(url, args.database_max_connections)
                .await
                .context("connecting to the discovery database")?;
            persister
                .migrate()
                .await
                .context("creating discovery tables")?;
            info!("Persisting discovery data to Postgres");
            Ok(Arc::new(persister))
        }
        None => {
            warn!("DATABASE_URL not set, discovery data is kept in memory");
            Ok(Arc::new(MemoryPersister::new()))
        }
    }
}

fn build_controller(args: &ClusterArgs, mut config: ControllerConfig) -> Arc<SyncController> {
    config.broker_wait_attempts = args.broker_wait_attempts;
    config.broker_wait_interval = Duration::from_secs(args.broker_wait_interval);

    warn!("Using the in-process broker; MeshSync events only arrive from local publishers");
    Arc::new(SyncController::new(
        config,
        Arc::new(ConnectionRegistry::new()),
        Arc::new(KubeOperatorFactory::new(args.operator_namespace.clone())),
        Arc::new(MemoryBroker::new()),
    ))
}

async fn run_controller(args: RunArgs) -> anyhow::Result<()> {
    info!(
        "Starting MeshSync Controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    let contexts = load_contexts(&args.cluster).await?;
    let provider = Arc::new(StaticProvider::new(build_persister(&args.cluster).await?));
    let controller = build_controller(
        &args.cluster,
        ControllerConfig {
            poll_interval: Duration::from_secs(args.poll_interval),
            bus_capacity: args.bus_capacity,
            ..Default::default()
        },
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
            shutdown.cancel();
        });
    }

    // Bus listener
    {
        let mut bus = controller.bus().subscribe();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    msg = bus.recv() => msg,
                };
                match msg {
                    Ok(msg) if msg.kind == MessageType::Error => {
                        warn!(source = ?msg.source, "Operator sync error: {}", msg.data)
                    }
                    Ok(msg) => info!(source = ?msg.source, "Operator sync health: {}", msg.data),
                    Err(RecvError::Lagged(n)) => warn!("Bus listener skipped {} envelopes", n),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    #[cfg(feature = "rest-api")]
    {
        let state = meshsync_controller::rest_api::ApiState {
            controller: controller.clone(),
            provider: provider.clone(),
        };
        let addr = args.listen;
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = meshsync_controller::rest_api::run_server(state, addr, shutdown).await {
                error!("REST API server error: {:?}", e);
            }
        });
    }

    let req = RequestContext::new()
        .with_kube_clusters(contexts.clone())
        .with_cancellation(shutdown.clone());

    connect_unbound(&controller, &req, &contexts).await;

    let mut statuses = controller
        .listen_to_meshsync_events(req.clone(), provider)
        .await?;
    while let Some(status) = statuses.recv().await {
        info!(
            "MeshSync {} {} is {}",
            status.name, status.version, status.status
        );
        if status.is_enabled() {
            connect_unbound(&controller, &req, &contexts).await;
        }
    }

    controller.shutdown();
    info!("MeshSync Controller stopped");
    Ok(())
}

/// Bind every context the registry does not know yet
async fn connect_unbound(
    controller: &SyncController,
    req: &RequestContext,
    contexts: &[K8sContext],
) {
    let pending = contexts
        .iter()
        .filter(|ctx| !controller.registry().is_bound(&ctx.id))
        .map(|ctx| async move {
            match controller.connect_to_nats(req, &ctx.id).await {
                Ok(status) => info!("Context {} is {}", ctx.id, status),
                Err(e) => warn!("Context {} is not connected: {}", ctx.id, e),
            }
        });
    futures::future::join_all(pending).await;
}

async fn run_resync(args: ResyncArgs) -> anyhow::Result<()> {
    let provider = StaticProvider::new(build_persister(&args.cluster).await?);
    let controller = build_controller(&args.cluster, ControllerConfig::default());

    if args.re_sync {
        let contexts = load_contexts(&args.cluster).await?;
        let req = RequestContext::new().with_kube_clusters(contexts.clone());
        controller
            .connect(&req, &contexts[0].id)
            .await
            .context("connecting to the broker")?;
    }

    let actions = ResyncActions {
        clear_db: args.clear_db,
        re_sync: args.re_sync,
        force: args.force,
    };
    let status = controller.resync(&provider, actions).await?;
    println!("{}", status);
    controller.shutdown();
    Ok(())
}
