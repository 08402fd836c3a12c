use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use vigil_core::abstractions::time::{Clock, SystemClock};
use vigil_core::config::VigilConfig;
use vigil_core::diagnosis::{DiagnosisSource, OpenAiDiagnosis, RuleBasedDiagnosis};
use vigil_core::orchestrator::OrchestratorDeps;
use vigil_core::pipeline::Pipeline;
use vigil_core::storage::IncidentStore;
use vigil_core::workload::{FaultKind, HealthProbe, HttpProbe, SimulatedWorkload, Workload};
use vigil_core::{VigilError, VigilResult};

mod demo;

const DEFAULT_STORE: &str = "incident_memory.json";

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Self-healing incident response for a managed service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start the managed workload and the incident response pipeline
    Run {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Inject a scripted sequence of faults after startup
        #[arg(long)]
        demo: bool,

        /// Use rule-based remediation plans only
        #[arg(long)]
        no_ai: bool,

        /// API key for the diagnosis endpoint
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Incident log location
        #[arg(long)]
        store: Option<PathBuf>,

        /// Address the workload serves HTTP on (e.g., 127.0.0.1:8080)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Inject a fault into a running workload over HTTP
    Trigger {
        /// crash, config, resource or dependency
        #[arg(long)]
        kind: String,

        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },
    /// Print what the incident log has recorded and learned
    Summary {
        #[arg(long, default_value = DEFAULT_STORE)]
        store: PathBuf,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget all incidents and learned fixes
    Reset {
        #[arg(long, default_value = DEFAULT_STORE)]
        store: PathBuf,

        /// Reset without confirmation
        #[arg(long)]
        force: bool,
    },
}

struct RunOptions {
    config: Option<PathBuf>,
    demo: bool,
    no_ai: bool,
    api_key: Option<String>,
    store: Option<PathBuf>,
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> VigilResult<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vigil=info,vigil_core=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            demo,
            no_ai,
            api_key,
            store,
            bind,
        } => {
            run(RunOptions {
                config,
                demo,
                no_ai,
                api_key,
                store,
                bind,
            })
            .await
        }
        Commands::Trigger { kind, addr } => handle_trigger_command(&kind, &addr).await,
        Commands::Summary { store, json } => handle_summary_command(&store, json),
        Commands::Reset { store, force } => handle_reset_command(&store, force),
    }
}

async fn run(options: RunOptions) -> VigilResult<()> {
    let mut config = VigilConfig::load(options.config.as_deref())?;
    if let Some(store) = options.store {
        config.storage.path = store;
    }
    if let Some(bind) = options.bind {
        config.workload.bind_address = Some(bind);
    }
    if let Some(key) = options.api_key {
        config.diagnosis.api_key = Some(key);
    }
    if options.no_ai {
        config.diagnosis.enabled = false;
    }
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let workload = Arc::new(SimulatedWorkload::new(config.workload.clone(), clock.clone()));
    if let Err(e) = workload.start().await {
        error!("Failed to start managed workload: {}", e);
        return Err(e);
    }

    let probe: Arc<dyn HealthProbe> = match config.workload.base_url() {
        Some(url) => Arc::new(HttpProbe::new(&url, config.monitor.probe_timeout, clock.clone())?),
        None => workload.clone(),
    };
    let diagnosis = diagnosis_source(&config)?;
    let store = Arc::new(IncidentStore::open(config.storage.path.clone(), clock.clone()));
    info!(
        "Incident log at {} ({} learned fixes)",
        store.path().display(),
        store.fixes().len()
    );

    let pipeline = Pipeline::spawn(
        &config,
        OrchestratorDeps {
            workload: workload.clone(),
            probe,
            diagnosis,
            store: store.clone(),
            clock: clock.clone(),
        },
    );

    let demo_task = options.demo.then(|| {
        tokio::spawn(demo::run(
            workload.clone(),
            clock.clone(),
            pipeline.signal(),
            demo::DemoTiming::default(),
        ))
    });

    info!("Monitoring every {:?}; press Ctrl-C to stop", config.monitor.check_interval);
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    pipeline.shutdown().await;
    if let Some(task) = demo_task {
        task.abort();
    }
    if let Err(e) = workload.stop().await {
        warn!("Failed to stop managed workload: {}", e);
    }

    println!("{}", store.summary());
    Ok(())
}

fn diagnosis_source(config: &VigilConfig) -> VigilResult<Arc<dyn DiagnosisSource>> {
    if config.diagnosis.is_active() {
        info!("Using {} for diagnosis", config.diagnosis.model);
        let source = OpenAiDiagnosis::new(
            config.diagnosis.clone(),
            config.workload.known_good.clone(),
        )?;
        Ok(Arc::new(source))
    } else {
        info!("External diagnosis disabled, using rule-based plans");
        Ok(Arc::new(RuleBasedDiagnosis::new()))
    }
}

async fn handle_trigger_command(kind: &str, addr: &str) -> VigilResult<()> {
    let fault: FaultKind = kind.parse()?;
    let probe = HttpProbe::new(
        &format!("http://{}", addr),
        Duration::from_secs(5),
        Arc::new(SystemClock),
    )?;
    let reply = probe.trigger(fault.as_str()).await?;
    println!("{}", reply);
    Ok(())
}

fn handle_summary_command(path: &Path, json: bool) -> VigilResult<()> {
    if IncidentStore::read_document(path)?.is_none() {
        println!("No incident log at {}", path.display());
        return Ok(());
    }

    let store = IncidentStore::open(path, Arc::new(SystemClock));
    if json {
        println!("{}", serde_json::to_string_pretty(&store.stats())?);
    } else {
        println!("{}", store.summary());
    }
    Ok(())
}

fn handle_reset_command(path: &Path, force: bool) -> VigilResult<()> {
    if !force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Remove every incident and learned fix in {}?",
                path.display()
            ))
            .default(false)
            .interact()
            .map_err(|e| VigilError::Internal {
                message: format!("Failed to read confirmation: {}", e),
            })?;
        if !confirmed {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let store = IncidentStore::open(path, Arc::new(SystemClock));
    store.clear()?;
    println!("Incident log at {} cleared", path.display());
    Ok(())
}
