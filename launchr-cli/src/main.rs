use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use crossbeam_channel::Receiver;
use launchr::{
    CliOverrides, LauncherConfig, LauncherContext, OrchestratorOptions, QueryOrchestrator,
    SearchEvent, SearchItem,
};
use serde_json::{json, Value};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to search (default: configured working_dir or current directory)
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,

    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single query and exit. Without it, every stdin line is a query.
    #[arg(short, long)]
    query: Option<String>,

    /// Enable file content search
    #[arg(long, conflicts_with = "no_text")]
    text: bool,

    /// Disable file content search
    #[arg(long = "no-text")]
    no_text: bool,

    /// Disable file name search
    #[arg(long = "no-file-name")]
    no_file_name: bool,

    /// Disable the portable application index
    #[arg(long = "no-portable")]
    no_portable: bool,

    /// Bytes of each file scanned by content search (0 = whole file)
    #[arg(long = "text-max-size")]
    text_max_size: Option<u64>,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print results as JSON lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        let text_support = match (self.text, self.no_text) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        CliOverrides {
            working_dir: self.dir.clone(),
            portable_app_support: self.no_portable.then_some(false),
            file_name_support: self.no_file_name.then_some(false),
            text_support,
            text_max_size: self.text_max_size,
            log_level: self.log_level.clone(),
        }
    }
}

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = LauncherConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?
        .merge_with_cli(cli.overrides());
    init_tracing(&config.log_level);

    let context = LauncherContext::new(config).context("failed to resolve working directory")?;
    let searchers = context.build_searchers();
    let options = OrchestratorOptions::from(context.config());
    let (sink, events) = crossbeam_channel::unbounded();
    let orchestrator = QueryOrchestrator::new(searchers, options, sink);
    let printer = Printer { json: cli.json };

    match cli.query {
        Some(query) => run_once(orchestrator, &events, &query, printer),
        None => run_interactive(orchestrator, events, printer, options.idle_interval),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Only fails when a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run_once(
    mut orchestrator: QueryOrchestrator,
    events: &Receiver<SearchEvent>,
    query: &str,
    printer: Printer,
) -> Result<()> {
    let generation = orchestrator.submit(query)?;
    for event in events.iter() {
        if event.generation() != generation {
            continue;
        }
        if printer.event(&event) {
            break;
        }
    }
    Ok(())
}

/// Each stdin line supersedes the query before it. Only events of the latest
/// query are printed.
fn run_interactive(
    mut orchestrator: QueryOrchestrator,
    events: Receiver<SearchEvent>,
    printer: Printer,
    idle: Duration,
) -> Result<()> {
    let current = Arc::new(AtomicU64::new(0));
    let shown = current.clone();
    let output = thread::Builder::new()
        .name("launchr-output".to_string())
        .spawn(move || {
            for event in events.iter() {
                if event.generation() == shown.load(Ordering::SeqCst) {
                    printer.event(&event);
                }
            }
        })
        .context("failed to start output thread")?;

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read query")?;
        // Mark the next generation current first so none of its events are
        // filtered out, while the cancelled one's are
        current.store(orchestrator.generation() + 1, Ordering::SeqCst);
        orchestrator.submit(line.trim_end())?;
    }

    // Input closed: let the last query finish, then close the stream
    while orchestrator.is_running() {
        thread::sleep(idle);
    }
    drop(orchestrator);
    if output.join().is_err() {
        debug!("Output thread panicked");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Printer {
    json: bool,
}

impl Printer {
    /// Prints one event. Returns true once the query is finished.
    fn event(&self, event: &SearchEvent) -> bool {
        match event {
            SearchEvent::Item { item, .. } => {
                self.item(item);
                false
            }
            SearchEvent::Progress { status, count, .. } => {
                debug!("{} {} so far", status, count);
                false
            }
            SearchEvent::Finished {
                count, cancelled, ..
            } => {
                if !cancelled {
                    self.summary(*count);
                }
                true
            }
        }
    }

    fn item(&self, item: &SearchItem) {
        if self.json {
            println!("{}", item_json(item));
        } else {
            let path = item
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!("{}\t{}", item.title, path);
        }
    }

    fn summary(&self, count: usize) {
        if self.json {
            println!("{}", json!({ "results": count }));
        } else {
            println!("{}", format!("{} results", count).green());
        }
    }
}

/// JSON form of an item; a missing path is `null`
fn item_json(item: &SearchItem) -> Value {
    json!({
        "title": item.title,
        "path": item.path.as_ref().map(|p| p.display().to_string()),
    })
}
