use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use sx_artifacts::{ArtifactGenerator, ArtifactKind};
use sx_core::{ConfigId, determine_order};
use sx_model::{DiagnosticCurve, ModelBuilder, ReferenceModelBuilder, curves_for};
use sx_pipeline::{
    ArtifactService, BatchScheduler, PipelineConfig, PipelineError, PipelineEvent,
    PipelineResult, PipelineStage,
};
use sx_source::{ConfigSource, SqliteConfigSource};
use sx_store::{ArtifactStore, ProgressLedger};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sx-cli")]
#[command(about = "Stellarator configuration precomputation and lookup", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PathArgs {
    /// YAML settings file
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite configuration database
    #[arg(long)]
    database: Option<PathBuf>,
    /// Artifact store directory
    #[arg(long)]
    store: Option<PathBuf>,
    /// Progress ledger file
    #[arg(long)]
    ledger: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and store artifacts for every configuration
    Precompute {
        #[command(flatten)]
        paths: PathArgs,
        /// Configurations per batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Worker threads (default: available cores minus one)
        #[arg(long)]
        workers: Option<usize>,
        /// Per-configuration timeout in seconds
        #[arg(long)]
        timeout_s: Option<f64>,
        /// Stop after this many batches
        #[arg(long)]
        max_batches: Option<u64>,
        /// Discard saved progress and start from the first configuration
        #[arg(long)]
        restart: bool,
    },
    /// Print one artifact as JSON, from the store or generated on demand
    Fetch {
        /// Configuration ID
        id: i64,
        /// Artifact kind
        #[arg(value_enum)]
        kind: KindArg,
        /// Print only this diagnostic curve, e.g. `1/L_grad_B`
        #[arg(long)]
        curve: Option<String>,
        #[command(flatten)]
        paths: PathArgs,
    },
    /// Show saved progress
    Status {
        #[command(flatten)]
        paths: PathArgs,
    },
    /// Show a configuration, its model order and its diagnostic curves
    Inspect {
        /// Configuration ID
        id: i64,
        #[command(flatten)]
        paths: PathArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Boundary,
    Diagnostics,
}

impl From<KindArg> for ArtifactKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Boundary => ArtifactKind::Boundary,
            KindArg::Diagnostics => ArtifactKind::Diagnostics,
        }
    }
}

fn main() -> PipelineResult<()> {
    // Logs go to stderr so `fetch` output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Precompute {
            paths,
            batch_size,
            workers,
            timeout_s,
            max_batches,
            restart,
        } => {
            let mut config = load_config(&paths)?;
            if let Some(n) = batch_size {
                config.batch_size = n;
            }
            if workers.is_some() {
                config.workers = workers;
            }
            if let Some(s) = timeout_s {
                config.item_timeout_s = s;
            }
            if max_batches.is_some() {
                config.max_batches = max_batches;
            }
            config.validate()?;
            cmd_precompute(config, restart)
        }
        Commands::Fetch {
            id,
            kind,
            curve,
            paths,
        } => cmd_fetch(load_config(&paths)?, id, kind.into(), curve.as_deref()),
        Commands::Status { paths } => cmd_status(load_config(&paths)?),
        Commands::Inspect { id, paths } => cmd_inspect(load_config(&paths)?, id),
    }
}

/// Settings file (or defaults), then path flags on top.
fn load_config(paths: &PathArgs) -> PipelineResult<PipelineConfig> {
    let mut config = match &paths.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(p) = &paths.database {
        config.database = p.clone();
    }
    if let Some(p) = &paths.store {
        config.store_root = p.clone();
    }
    if let Some(p) = &paths.ledger {
        config.ledger_path = p.clone();
    }
    Ok(config)
}

fn open_source(config: &PipelineConfig) -> PipelineResult<Arc<dyn ConfigSource>> {
    Ok(Arc::new(SqliteConfigSource::open(&config.database)?))
}

fn cmd_precompute(config: PipelineConfig, restart: bool) -> PipelineResult<()> {
    let ledger = ProgressLedger::new(config.ledger_path.clone());
    if restart {
        println!("Discarding saved progress: {}", ledger.path().display());
        ledger.clear()?;
    }
    let source = open_source(&config)?;
    let builder: Arc<dyn ModelBuilder> = Arc::new(ReferenceModelBuilder::default());
    let store = ArtifactStore::new(config.store_root.clone())?;

    println!(
        "Precomputing {} -> {} (batch size {}, {} workers)",
        config.database.display(),
        config.store_root.display(),
        config.batch_size,
        config.worker_count()
    );

    let scheduler = BatchScheduler::new(config, source, builder, store, ledger);
    let summary = scheduler.run_with_progress(Some(&mut |event: PipelineEvent| {
        render_progress(&event)
    }))?;

    println!();
    println!("✓ Precomputation finished");
    println!(
        "  Successful:      {}/{} ({} completed)",
        summary.succeeded, summary.total, summary.completed
    );
    println!(
        "  This run:        {} items in {:.1}s ({:.2}s per item)",
        summary.processed,
        summary.run_elapsed_s,
        summary.seconds_per_item()
    );
    println!("  Total time:      {:.2} hours", summary.total_elapsed_s / 3600.0);
    println!("  Throughput:      {:.2} configs/sec", summary.rate());
    println!("  Skipped:         {}", summary.skipped);
    println!("  Partial:         {}", summary.partial);
    println!("  Failed:          {}", summary.failed);
    println!("  Timed out:       {}", summary.timed_out);
    Ok(())
}

fn render_progress(event: &PipelineEvent) {
    match event.stage {
        PipelineStage::BatchCompleted => println!(
            "Batch at {} done: {}/{} ({:.1}%) after {:.1}s",
            event.batch_start.unwrap_or_default(),
            event.completed,
            event.total,
            event.fraction_complete() * 100.0,
            event.elapsed_wall_s
        ),
        PipelineStage::BackpressureWait => {
            if let Some(msg) = &event.message {
                println!("Pausing: {msg}");
            }
        }
        _ => {}
    }
}

fn cmd_fetch(
    config: PipelineConfig,
    id: i64,
    kind: ArtifactKind,
    curve: Option<&str>,
) -> PipelineResult<()> {
    let curve = curve.map(|name| parse_curve(name, kind)).transpose()?;
    let source = open_source(&config)?;
    let store = ArtifactStore::new(config.store_root.clone())?;
    let service = ArtifactService::new(
        source,
        Arc::new(ReferenceModelBuilder::default()),
        store,
        ArtifactGenerator::new(config.radii.clone()),
    );
    let mut response = service.fetch(ConfigId::new(id), kind)?;
    if let Some(curve) = curve {
        response.interactive_data = response
            .interactive_data
            .and_then(|mut figures| figures.get_mut(curve.name()).map(Value::take));
    }
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn parse_curve(name: &str, kind: ArtifactKind) -> PipelineResult<DiagnosticCurve> {
    if kind != ArtifactKind::Diagnostics {
        return Err(PipelineError::InvalidInput(
            "--curve only applies to diagnostics".into(),
        ));
    }
    DiagnosticCurve::from_name(name)
        .ok_or_else(|| PipelineError::InvalidInput(format!("unknown diagnostic curve: {name}")))
}

fn cmd_status(config: PipelineConfig) -> PipelineResult<()> {
    let ledger = ProgressLedger::new(config.ledger_path.clone());
    let Some(state) = ledger.load() else {
        println!("No saved progress at {}", ledger.path().display());
        return Ok(());
    };

    println!("Progress ledger: {}", ledger.path().display());
    println!("  Completed:       {}", state.completed);
    println!("  Successful:      {}", state.success_count);
    println!("  Last batch at:   {}", state.last_batch);
    println!("  Elapsed:         {:.2} hours", state.elapsed_time / 3600.0);
    if let Some(at) = &state.updated_at {
        println!("  Updated:         {at}");
    }

    match open_source(&config).and_then(|source| source.count().map_err(PipelineError::from)) {
        Ok(total) if total > 0 => println!(
            "  Total:           {} ({:.1}% complete)",
            total,
            100.0 * state.completed as f64 / total as f64
        ),
        Ok(_) => println!("  Total:           0"),
        Err(e) => println!("  Total:           unknown ({e})"),
    }
    Ok(())
}

fn cmd_inspect(config: PipelineConfig, id: i64) -> PipelineResult<()> {
    let source = open_source(&config)?;
    let id = ConfigId::new(id);
    let record = source
        .get(id)?
        .ok_or(PipelineError::ConfigNotFound { id })?;
    let order = determine_order(&record);

    println!("Configuration {id}");
    println!("  nfp:         {}", record.nfp);
    println!("  rc:          {:?}", record.rc);
    println!("  zs:          {:?}", record.zs);
    println!("  etabar:      {}", record.etabar);
    println!("  B2c:         {}", fmt_opt(record.b2c));
    println!("  p2:          {}", fmt_opt(record.p2));
    println!("  axis_length: {}", fmt_opt(record.axis_length));
    println!("  iota:        {}", fmt_opt(record.iota));
    println!("Model order: {order} ({order:?})");
    println!("Diagnostic curves:");
    for curve in curves_for(order) {
        println!("  {}", curve.name());
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
