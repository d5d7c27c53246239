use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use omerotag::config::{TaggerConfig, DEFAULT_CONFIG_PATH, GRAPH_ENV};
use omerotag::{exit_code, load_rule_records, AliasExtension};
use omerotag_core::{CapabilityRegistry, Error};
use omerotag_engine::{DryRunReport, Engine, MemoryStore, RunMode, TagCache};
use omerotag_rules::compile;

#[derive(Parser)]
#[command(
    name = "omerotag",
    version,
    about = "Apply naming and attribute tagging rules to an object graph"
)]
struct Cli {
    /// YAML or JSON file with the tagging rules
    rules: PathBuf,

    /// YAML file of extra accessor aliases per object type
    #[arg(long)]
    extensions: Option<PathBuf>,

    /// Graph snapshot to tag (overrides OMERO_GRAPH and the config file)
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Record the tags that would change in a CSV report instead of applying them
    #[arg(long, default_value_t = false)]
    dry: bool,

    /// Dry-run report path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "omerotag.log".into());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "omerotag=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn run(cli: &Cli) -> Result<()> {
    let config = TaggerConfig::load(&cli.config);

    let graph = config
        .graph_path(cli.graph.as_deref(), std::env::var(GRAPH_ENV).ok())
        .ok_or_else(|| {
            Error::Connection(format!(
                "no graph to connect to: pass --graph, set {} or [store] graph",
                GRAPH_ENV
            ))
        })?;
    let store = MemoryStore::open(&graph)?;

    let mut registry = CapabilityRegistry::new();
    registry.install(&store)?;
    if let Some(path) = &cli.extensions {
        let aliases = AliasExtension::load(path)
            .with_context(|| format!("loading extensions from {}", path.display()))?;
        registry.install(&aliases)?;
    }

    let records = load_rule_records(&cli.rules)?;
    let rules = compile(records, &registry).context("compiling rules")?;
    tracing::debug!("Path tree:\n{}", rules.path_tree.render());

    let engine = Engine::new(&store, &store, &registry, &rules)
        .with_tag_description(config.tags.description.clone());
    let mut cache = TagCache::new();

    if cli.dry {
        let path = config.report_path(cli.report.as_deref());
        println!(
            "Dry run: no tags will be changed. Report goes to {}",
            path.display()
        );
        let mut report = DryRunReport::append(&path)?;
        let summary = engine.run(RunMode::DryRun(&mut report), &mut cache)?;
        println!("{} objects written to {}", summary.objects(), path.display());
    } else {
        let summary = engine.run(RunMode::Apply, &mut cache)?;
        for outcome in &summary.outcomes {
            println!("{}", outcome);
        }
        store
            .save(&graph)
            .with_context(|| format!("saving graph {}", graph.display()))?;
        println!(
            "{} objects, {} links added, {} removed",
            summary.objects(),
            summary.links_added,
            summary.links_removed
        );
    }
    Ok(())
}
