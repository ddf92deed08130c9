//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::{Config, ProcessingMode};

/// Scrummaster - project descriptions to Jira epics and stories
#[derive(Parser)]
#[command(
    name = "sm",
    about = "Break a project description into epics and stories and file them in Jira",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze a project description and create Jira tickets
    Process {
        /// Project description file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Processing mode (overrides processing.mode)
        #[arg(short, long, value_enum)]
        mode: Option<ProcessingMode>,

        /// Output directory (overrides processing.output-dir)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Analyze and display without creating tickets
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Create Jira tickets from a saved analysis file
    CreateFromAnalysis {
        /// Analysis JSON written by `process`
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Display without creating tickets
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Write a sample config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scrummaster")
        .join("logs")
        .join("scrummaster.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with secret checks and file locations
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let defaults = Config::default();
    let secrets = [defaults.llm.api_key_env.as_str(), defaults.jira.api_token_env.as_str()];

    let mut help = String::new();

    help.push_str("Environment:\n");
    for var in secrets {
        let set = std::env::var(var).is_ok_and(|v| !v.trim().is_empty());
        let icon = if set { "\u{2705}" } else { "\u{274C}" };
        let status = if set { "set" } else { "not set" };
        help.push_str(&format!("  {} {:<20} {}\n", icon, var, status));
    }

    help.push('\n');
    help.push_str("Config is read from: --config, ./.scrummaster.yml");
    if let Some(user) = Config::user_config_path() {
        help.push_str(&format!(", {}", user.display()));
    }
    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));

    debug!("generate_after_help: returning help text");
    help
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from([
            "sm",
            "-l",
            "debug",
            "process",
            "project.md",
            "--mode",
            "analyze-only",
            "--output",
            "out",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Process {
                input,
                mode,
                output,
                dry_run,
                yes,
            } => {
                assert_eq!(input, PathBuf::from("project.md"));
                assert_eq!(mode, Some(ProcessingMode::AnalyzeOnly));
                assert_eq!(output, Some(PathBuf::from("out")));
                assert!(dry_run);
                assert!(!yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_from_analysis_with_global_config() {
        let cli = Cli::try_parse_from(["sm", "create-from-analysis", "a.json", "--yes", "-c", "cfg.yml"]).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("cfg.yml")));
        assert!(matches!(
            cli.command,
            Command::CreateFromAnalysis { yes: true, dry_run: false, .. }
        ));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["sm", "process", "p.md", "--mode", "create-only"]).is_err());
    }

    #[test]
    fn test_log_path_location() {
        let path = get_log_path();
        assert!(path.ends_with("scrummaster/logs/scrummaster.log"));
    }
}
