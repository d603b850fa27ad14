use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use std::{fs, io, thread};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, error, info, warn};
use uppe_core::cache::write_object_cache;
use uppe_core::events::{EventKind, TimedEvent};
use uppe_core::processor::DueCheck;
use uppe_core::{CheckProcessor, CheckResultQueue, Contact, Registry, query, resolve};

mod config;
mod definitions;
mod intake;
mod notify;

use config::Config;
use definitions::Definitions;
use intake::LineSource;
use notify::LogSink;

const FRESHNESS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(version, about = "Uppe monitoring engine")]
struct Cli {
    /// Configuration file, defaults to $XDG_CONFIG_HOME/uppe/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load and resolve object definitions, reporting every error
    Verify,
    /// Write the resolved object cache
    Cache {
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the result processing engine until interrupted
    Run,
    /// Print the effective configuration
    ShowConfig,
}

/// Load definitions and link them, logging every problem found
fn load_registry(path: &Path) -> Result<Registry> {
    let definitions = Definitions::from_file(path)?;
    let mut registry = match definitions.build() {
        Ok(registry) => registry,
        Err(errors) => {
            for e in &errors.0 {
                error!("{e}");
            }
            bail!("{} definition error(s) in {}", errors.0.len(), path.display());
        }
    };
    if let Err(errors) = resolve(&mut registry) {
        for e in errors.iter() {
            error!("{e}");
        }
        bail!("{} unresolved reference(s) in {}", errors.len(), path.display());
    }
    Ok(registry)
}

fn verify(config: &Config) -> Result<()> {
    let registry = load_registry(&config.objects)?;
    println!("Definitions in {} are valid", config.objects.display());
    println!("  Hosts:    {}", query::total_hosts(&registry));
    println!("  Services: {}", query::total_services(&registry));
    println!("  Contacts: {}", registry.len::<Contact>());
    Ok(())
}

fn cache(config: &Config, output: Option<&Path>) -> Result<()> {
    let registry = load_registry(&config.objects)?;
    match output {
        Some(path) => {
            let mut file = io::BufWriter::new(
                fs::File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?,
            );
            write_object_cache(&registry, &mut file)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "Object cache written");
        }
        None => {
            let stdout = io::stdout();
            write_object_cache(&registry, &mut stdout.lock()).context("failed to write cache")?;
        }
    }
    Ok(())
}

/// Periodic work while no results arrive
fn housekeeping(processor: &mut CheckProcessor<LogSink>) {
    let now = SystemTime::now();
    for event in processor.pop_due_events(now) {
        match event.kind {
            EventKind::FreshnessCheck => {
                for target in processor.stale_objects(now) {
                    warn!(object = %target, "Passive check results are stale");
                }
            }
            kind @ (EventKind::HostCheck(_) | EventKind::ServiceCheck(_)) => {
                match processor.due_check(kind, now) {
                    Some(DueCheck::Run(target)) => debug!(object = %target, "Check due"),
                    Some(DueCheck::Deferred { target, blocked, .. }) => {
                        info!(object = %target, reason = %blocked, "Check skipped, dependency failed");
                    }
                    None => {}
                }
            }
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let registry = load_registry(&config.objects)?;
    let queue = Arc::new(match config.engine.queue_capacity {
        0 => CheckResultQueue::new(),
        capacity => CheckResultQueue::bounded(capacity),
    });

    let mut processor =
        CheckProcessor::new(registry, config.engine.processor_config(), LogSink::default());
    let now = SystemTime::now();
    processor.schedule_initial_checks(now);
    processor.schedule(TimedEvent::recurring(
        EventKind::FreshnessCheck,
        now + FRESHNESS_INTERVAL,
        FRESHNESS_INTERVAL,
    ));

    let poll = config.engine.poll_interval();
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::Builder::new()
            .name("result-processor".into())
            .spawn(move || {
                let stats = uppe_core::run(&queue, &mut processor, poll, housekeeping);
                (stats, processor.sink().dispatched)
            })
            .context("failed to start processing thread")?
    };

    let backoff = config.intake.retry_backoff();
    let mut intakes = Vec::new();
    if config.intake.stdin {
        let queue = Arc::clone(&queue);
        intakes.push(tokio::spawn(async move {
            let mut source = LineSource::stdin();
            if let Err(e) = intake::forward(&mut source, &queue, backoff).await {
                error!("Standard input intake failed: {e:#}");
            }
        }));
    }
    if let Some(addr) = config.intake.listen {
        let listener = intake::bind(addr).await?;
        let queue = Arc::clone(&queue);
        intakes.push(tokio::spawn(async move {
            if let Err(e) = intake::serve(listener, queue, backoff).await {
                error!("Remote intake stopped: {e:#}");
            }
        }));
    }

    info!(objects = %config.objects.display(), "Engine running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Shutting down");

    for intake in &intakes {
        intake.abort();
    }
    queue.close();
    let (stats, dispatched) = tokio::task::spawn_blocking(move || consumer.join())
        .await
        .context("failed to join processing thread")?
        .map_err(|_| anyhow::anyhow!("processing thread panicked"))?;

    let queue_stats = queue.stats();
    info!(
        processed = stats.processed,
        rejected = stats.rejected,
        late = queue_stats.late_arrivals,
        notifications = dispatched,
        "Engine stopped"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logger::init_tracing_with_level(logger::level_for_verbosity(cli.verbose));

    let config = Config::from_config(cli.config.as_ref())?;
    debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Verify => verify(&config),
        Commands::Cache { output } => cache(&config, output.as_deref()),
        Commands::Run => run(config).await,
        Commands::ShowConfig => {
            println!("{config}");
            Ok(())
        }
    }
}
