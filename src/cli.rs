use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "feedbox")]
#[command(about = "Feed-driven task runner", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to FEEDBOX_CONFIG or config/feedbox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run configured tasks
    Execute(ExecuteArgs),
    /// Validate the configuration without running anything
    Check,
    /// Inspect or clear the recent failure log
    Failed {
        #[command(subcommand)]
        command: FailedCommand,
    },
    /// Manage remembered (seen) entries
    Seen {
        #[command(subcommand)]
        command: SeenCommand,
    },
}

#[derive(clap::Args, Debug)]
pub struct ExecuteArgs {
    /// Only run these tasks (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub tasks: Vec<String>,

    /// Dry run: skip learning and do not save ledger changes
    #[arg(long)]
    pub test: bool,

    /// Ignore interval gating
    #[arg(long)]
    pub now: bool,

    /// Stop on the first unexpected plugin error
    #[arg(long)]
    pub strict: bool,

    /// Log entry decisions and plugin timings
    #[arg(long)]
    pub details: bool,
}

#[derive(Subcommand, Debug)]
pub enum FailedCommand {
    /// List recent failures, oldest first
    List,
    /// Forget every recorded failure
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum SeenCommand {
    /// Forget a remembered title, url or other field value
    Forget { value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_execute() {
        let cli = Cli::parse_from([
            "feedbox", "execute", "--tasks", "tv,movies", "--test", "--now",
        ]);
        match cli.command {
            Commands::Execute(args) => {
                assert_eq!(args.tasks, vec!["tv", "movies"]);
                assert!(args.test);
                assert!(args.now);
                assert!(!args.strict);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_config_and_subcommands() {
        let cli = Cli::parse_from(["feedbox", "seen", "forget", "Foo", "--config", "x.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(
            cli.command,
            Commands::Seen { command: SeenCommand::Forget { ref value } } if value == "Foo"
        ));

        let cli = Cli::parse_from(["feedbox", "failed", "clear"]);
        assert!(matches!(
            cli.command,
            Commands::Failed { command: FailedCommand::Clear }
        ));
    }
}
