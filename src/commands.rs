use feedbox::config::Config;
use feedbox::engine::{Manager, RunSummary};
use feedbox::ledger::{FailureLog, FjallStore};
use feedbox::observability;
use feedbox::plugins::{PluginRegistry, seen};
use feedbox::task::RunOptions;
use tracing::info;

use crate::cli::{Cli, Commands, ExecuteArgs, FailedCommand, SeenCommand};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(cli: Cli) -> Result<(), AnyError> {
    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    observability::init_tracing(&config.logging.filter);

    match cli.command {
        Commands::Execute(args) => execute(config, args).await,
        Commands::Check => check(&config),
        Commands::Failed { command } => failed(&config, command),
        Commands::Seen { command } => seen_command(&config, command),
    }
}

async fn execute(config: Config, args: ExecuteArgs) -> Result<(), AnyError> {
    let manager = Manager::new(config, PluginRegistry::with_builtins())?;
    let options = RunOptions::builder()
        .test(args.test)
        .now(args.now)
        .strict(args.strict)
        .details(args.details)
        .build();

    let summaries = manager.execute(&args.tasks, options).await?;
    for summary in &summaries {
        print_summary(summary);
    }

    let metrics = manager.metrics();
    info!(
        tasks = metrics.tasks_run,
        aborted = metrics.tasks_aborted,
        accepted = metrics.entries_accepted,
        "Execution complete"
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    match &summary.aborted {
        Some(reason) => println!("{:<20} aborted: {}", summary.task, reason),
        None => println!(
            "{:<20} accepted {:>4}  rejected {:>4}  failed {:>4}  ({} ms)",
            summary.task,
            summary.accepted,
            summary.rejected,
            summary.failed,
            summary.elapsed.as_millis()
        ),
    }
}

fn check(config: &Config) -> Result<(), AnyError> {
    let tasks = Manager::check(config, &PluginRegistry::with_builtins())?;
    println!("Configuration is valid ({} tasks)", tasks.len());
    for name in tasks.keys() {
        println!("  {}", name);
    }
    Ok(())
}

fn failed(config: &Config, command: FailedCommand) -> Result<(), AnyError> {
    let store = FjallStore::open(&config.ledger.path)?;
    let log = FailureLog::new(store.clone());

    match command {
        FailedCommand::List => {
            let records = log.list()?;
            if records.is_empty() {
                println!("No failed entries recorded");
            }
            for record in records {
                println!(
                    "{}  {} ({})  x{}  task={} plugin={} reason={}",
                    record.last_failed.format("%Y-%m-%d %H:%M"),
                    record.title,
                    record.url,
                    record.count,
                    record.task,
                    record.plugin.as_deref().unwrap_or("-"),
                    record.reason.as_deref().unwrap_or("-")
                );
            }
        }
        FailedCommand::Clear => {
            let cleared = log.clear()?;
            store.persist()?;
            println!("Cleared {} failed entries", cleared);
        }
    }
    Ok(())
}

fn seen_command(config: &Config, command: SeenCommand) -> Result<(), AnyError> {
    let store = FjallStore::open(&config.ledger.path)?;

    match command {
        SeenCommand::Forget { value } => {
            let removed = seen::forget(&store, &value)?;
            println!("Removed {} seen records for '{}'", removed, value);
        }
    }
    Ok(())
}
