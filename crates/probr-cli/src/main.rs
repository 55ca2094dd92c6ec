//! Probr - compliance probes for cloud-native platforms
//!
//! The `probr` command registers the probes found under the features
//! directory, applies the configured exclusions and runs the rest through the
//! BDD runner.
//!
//! ## Commands
//!
//! - `run`: Execute probes; the process exit code is the aggregate result
//! - `list`: Show registered probes and whether they will run
//! - `tags`: Print the tag expression handed to the runner

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};

use probr_core::config::ServicePacks;
use probr_core::{
    AuditSink, CommandEngine, ExclusionPolicy, FeatureProbe, FsAuditSink, Group,
    MemoryAuditSink, Orchestrator, ProbeStore, ProbrConfig, TestEngine,
};

#[derive(Parser)]
#[command(name = "probr")]
#[command(author = "Probr Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compliance probes for cloud-native platforms", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and results
    #[arg(long, global = true)]
    json: bool,

    /// Path to the vars file
    #[arg(short, long, global = true, env = "PROBR_CONFIG", default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run probes
    Run {
        /// Only run this service pack
        pack: Option<String>,

        /// Tag expression; replaces the configured exclusions
        #[arg(long)]
        tags: Option<String>,
    },

    /// List registered probes and their exclusion decision
    List {
        /// Only consider this service pack
        pack: Option<String>,
    },

    /// Print the effective tag expression
    Tags {
        /// Tag expression; replaces the configured exclusions
        #[arg(long)]
        tags: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (pack, tags) = match &cli.command {
        Commands::Run { pack, tags } => (pack.clone(), tags.clone()),
        Commands::List { pack } => (pack.clone(), None),
        Commands::Tags { tags } => (None, tags.clone()),
    };
    let config = load_config(&cli.config, pack, tags)?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        probr_core::parse_log_level(&config.log_level)
    };
    probr_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run { .. } => {
            let code = cmd_run(config, cli.json).await?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::List { .. } => cmd_list(config),
        Commands::Tags { .. } => {
            println!("{}", ExclusionPolicy::builtin(config).effective_tags());
            Ok(())
        }
    }
}

/// Load the vars file, with a pack chosen on the command line taking the
/// RunOnly slot and `--tags` overriding the configured tags.
fn load_config(path: &str, pack: Option<String>, tags: Option<String>) -> Result<ProbrConfig> {
    let mut config = ProbrConfig::default();
    if let Some(pack) = pack {
        config.meta.run_only = pack;
    }
    config
        .reload(path)
        .with_context(|| format!("Failed to load config '{}'", path))?;
    if let Some(tags) = tags {
        config.tags = tags;
    }
    Ok(config)
}

fn group_for(pack: &str) -> Group {
    match pack {
        "kubernetes" => Group::Kubernetes,
        _ => Group::CloudDriver,
    }
}

/// One orchestrator per service pack, with its discovered probes registered.
fn build_orchestrators(
    config: &ProbrConfig,
    policy: Arc<ExclusionPolicy>,
    engine: Arc<dyn TestEngine>,
    audit: Arc<dyn AuditSink>,
) -> Result<Vec<Orchestrator>> {
    let features = Path::new(&config.engine.features_directory);
    let mut orchestrators = Vec::new();

    for pack in ServicePacks::NAMES {
        policy.log_pack_decision(pack);

        let store = Arc::new(ProbeStore::new(pack, group_for(pack), audit.clone()));
        let orchestrator = Orchestrator::new(store, engine.clone(), policy.clone());

        let probes = FeatureProbe::discover(features, pack)
            .with_context(|| format!("Failed to read features for pack '{}'", pack))?;
        for probe in probes {
            orchestrator
                .register(Arc::new(probe))
                .with_context(|| format!("Failed to register probe in pack '{}'", pack))?;
        }
        orchestrators.push(orchestrator);
    }
    Ok(orchestrators)
}

/// Run every pack and return the aggregate exit code.
async fn cmd_run(config: ProbrConfig, json_output: bool) -> Result<i32> {
    match config.log_config_state() {
        Ok(Some(path)) => info!(path = %path.display(), "config state written"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "failed to write config state"),
    }

    let audit_dir = config
        .audit_dir()
        .context("Failed to prepare audit directory")?;
    let audit: Arc<dyn AuditSink> = Arc::new(FsAuditSink::new(audit_dir, config.overwrite()));
    let engine: Arc<dyn TestEngine> = Arc::new(CommandEngine::new(config.engine.command.clone()));
    let policy = Arc::new(ExclusionPolicy::builtin(config.clone()));

    let mut exit_code = 0;
    let mut summary = Vec::new();

    for orchestrator in build_orchestrators(&config, policy, engine, audit)? {
        let report = orchestrator.execute_all().await;
        exit_code = exit_code.max(report.exit_code);

        for result in &report.results {
            if json_output {
                summary.push(json!({
                    "pack": orchestrator.store().name(),
                    "probe": result.probe,
                    "status": result.status.as_str(),
                    "exit_code": result.exit_code,
                }));
            } else {
                let mark = match result.exit_code {
                    0 => "✓",
                    _ => "✗",
                };
                println!(
                    "  {} {}/{} ({})",
                    mark,
                    orchestrator.store().name(),
                    result.probe,
                    result.status
                );
            }
        }
    }

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "exit_code": exit_code,
                "probes": summary,
            }))?
        );
    } else {
        println!();
        println!("Exit code: {}", exit_code);
    }

    Ok(exit_code)
}

fn cmd_list(config: ProbrConfig) -> Result<()> {
    let audit: Arc<dyn AuditSink> = Arc::new(MemoryAuditSink::new());
    let engine: Arc<dyn TestEngine> = Arc::new(CommandEngine::new(config.engine.command.clone()));
    let policy = Arc::new(ExclusionPolicy::builtin(config.clone()));

    for orchestrator in build_orchestrators(&config, policy.clone(), engine, audit)? {
        let pack = orchestrator.store().name();
        for entry in orchestrator.store().enumerate() {
            match policy.probe(pack, entry.name()) {
                Some(reason) => println!("  - {}/{} ({})", pack, entry.name(), reason),
                None => println!("  + {}/{}", pack, entry.name()),
            }
        }
    }
    Ok(())
}
