use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use pilet_core::{
    dependency_manager::DependencySnapshot, host::HostCall, DependencyOrchestrator, EventLog,
    EventStats, InMemoryHost, LoadPlan, LoadStatus,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "pilet-cli", version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a load plan against an in-memory host and report what was linked
    Simulate {
        /// Path to the TOML load plan
        #[arg(long)]
        plan: PathBuf,

        /// Simulated latency of every host primitive
        #[arg(long)]
        latency_ms: Option<u64>,

        /// Skip releasing the pilets after loading
        #[arg(long)]
        keep: bool,
    },
    /// Parse and validate a load plan
    Validate {
        /// Path to the TOML load plan
        #[arg(long)]
        plan: PathBuf,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PiletReport {
    name: String,
    session_id: Uuid,
    priority: u32,
    status: String,
    shared_dependencies: Vec<String>,
    bundle_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    elapsed_ms: i64,
    pilets: Vec<PiletReport>,
    host_calls: Vec<HostCall>,
    shared_registry: Vec<DependencySnapshot>,
    linked_resources: Vec<String>,
    active_bundles: Vec<String>,
}

fn describe(status: &LoadStatus) -> String {
    match status {
        LoadStatus::Unregistered => "unregistered".to_string(),
        LoadStatus::Pending => "pending".to_string(),
        LoadStatus::Loading => "loading".to_string(),
        LoadStatus::Resolved => "resolved".to_string(),
        LoadStatus::Failed(err) => format!("failed: {}", err),
    }
}

async fn simulate(plan: LoadPlan, latency: Option<Duration>, keep: bool) -> SimulationReport {
    let host = latency.map(InMemoryHost::with_latency).unwrap_or_default();
    let orchestrator =
        DependencyOrchestrator::new(Arc::new(host.clone()), plan.loader.bootstrap());
    let mut rx = orchestrator.events().subscribe();
    let started = Utc::now();

    let sessions: Vec<_> = plan
        .pilets
        .iter()
        .map(|manifest| {
            let loader = orchestrator.create_loader();
            let handle = loader.define_manifest(manifest);
            (manifest, loader, handle)
        })
        .collect();
    orchestrator.activate();

    let capabilities = plan.loader.host_capabilities();
    let results = join_all(
        sessions
            .iter()
            .map(|(_, _, handle)| handle.load(capabilities.clone())),
    )
    .await;

    for ((manifest, _, _), result) in sessions.iter().zip(&results) {
        match result {
            Ok(()) => info!(pilet = %manifest.name, "Pilet loaded"),
            Err(err) => error!(pilet = %manifest.name, "Pilet failed to load: {}", err),
        }
    }

    let log = EventLog::default();
    log.drain_from(&mut rx);
    for record in log.all() {
        println!("{}", record);
    }

    let stats = EventStats::from_records(&log.all());
    println!(
        "Loads started: {}, finished: {}",
        stats.loads_started, stats.loads_finished
    );
    for name in stats.unfinished() {
        println!("  never finished: {}", name);
    }

    let pilets = sessions
        .iter()
        .map(|(manifest, loader, _)| PiletReport {
            name: manifest.name.clone(),
            session_id: loader.session_id(),
            priority: manifest.clamped_priority(),
            status: describe(&loader.status()),
            shared_dependencies: loader.defined_references(),
            bundle_ids: loader.loaded_bundle_ids(),
        })
        .collect();

    if !keep {
        for (manifest, loader, _) in &sessions {
            if let Err(err) = loader.release_references().await {
                error!(pilet = %manifest.name, "Release failed: {}", err);
            }
        }
    }

    SimulationReport {
        elapsed_ms: (Utc::now() - started).num_milliseconds(),
        pilets,
        host_calls: host.calls(),
        shared_registry: orchestrator.shared_dependencies().snapshot(),
        linked_resources: host.linked_resources(),
        active_bundles: host.active_bundles(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            plan,
            latency_ms,
            keep,
        } => {
            let plan = match LoadPlan::from_file(&plan).await {
                Ok(plan) => plan,
                Err(e) => {
                    error!("Failed to read plan: {}", e);
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            let report = simulate(plan, latency_ms.map(Duration::from_millis), keep).await;
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: failed to render report: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Validate { plan } => match LoadPlan::from_file(&plan).await {
            Ok(plan) => {
                println!("Plan is valid: {} pilet(s)", plan.pilets.len());
                match toml::to_string_pretty(&plan) {
                    Ok(normalized) => println!("{}", normalized),
                    Err(e) => eprintln!("Warning: could not render plan: {}", e),
                }
            }
            Err(e) => {
                error!("Invalid plan: {}", e);
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }
}
