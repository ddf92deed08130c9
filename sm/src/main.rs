//! Scrummaster - project descriptions to Jira tickets
//!
//! CLI entry point for analyzing descriptions and filing epics and stories.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use eyre::{Context, Result, bail};
use rustyline::error::ReadlineError;
use tracing::{debug, info, warn};

use scrummaster::chunker::Chunk;
use scrummaster::cli::{Cli, Command, generate_after_help, get_log_path};
use scrummaster::config::{Config, ProcessingMode};
use scrummaster::domain::Breakdown;
use scrummaster::llm::create_client;
use scrummaster::output::{load_analysis, save_analysis, save_chunk_result};
use scrummaster::pipeline::{Pipeline, PipelineConfig, PipelineError};
use scrummaster::progress::{ConsoleProgress, ProgressSink};
use scrummaster::prompts::PromptLoader;
use scrummaster::provider::LlmBreakdownProvider;
use scrummaster::report::{render_breakdown, render_creation_report};
use scrummaster::tickets::{CreationError, Pacing, TicketCoordinator};
use scrummaster::tracker::{IssueTracker, JiraClient};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here is traced
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    // init must work before any config file exists
    if let Command::Init { force } = cli.command {
        debug!(force, "main: matched Init command");
        return cmd_init(cli.config.as_ref(), force);
    }

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, mode = %config.processing.mode, "Scrummaster loaded config");

    let progress: Arc<dyn ProgressSink> = Arc::new(ConsoleProgress::new());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Process {
            input,
            mode,
            output,
            dry_run,
            yes,
        } => {
            debug!(?input, ?mode, ?output, dry_run, yes, "main: matched Process command");
            let mode = mode.unwrap_or(config.processing.mode);
            let output_dir = output.unwrap_or_else(|| config.processing.output_dir.clone());
            cmd_process(&config, &input, mode, output_dir, dry_run, yes, progress).await
        }
        Command::CreateFromAnalysis { file, dry_run, yes } => {
            debug!(?file, dry_run, yes, "main: matched CreateFromAnalysis command");
            cmd_create_from_analysis(&config, &file, dry_run, yes, progress).await
        }
        Command::Init { .. } => Ok(()),
    }
}

async fn cmd_process(
    config: &Config,
    input: &Path,
    mode: ProcessingMode,
    output_dir: PathBuf,
    dry_run: bool,
    yes: bool,
    progress: Arc<dyn ProgressSink>,
) -> Result<()> {
    debug!(?input, %mode, ?output_dir, dry_run, yes, "cmd_process: called");
    config.validate_for(mode, true, dry_run)?;

    progress.header("Scrummaster");
    progress.info(&format!("Mode: {}{}", mode, if dry_run { " (dry run)" } else { "" }));

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let root = std::env::current_dir().context("Failed to get current directory")?;
    let provider = Arc::new(LlmBreakdownProvider::new(
        llm,
        PromptLoader::new(root),
        config.llm.max_tokens,
    ));

    let mut pipeline = Pipeline::new(PipelineConfig::from_llm(&config.llm), provider, progress.clone());
    if config.processing.save_intermediate {
        let (dir, source, sink) = (output_dir.clone(), input.to_path_buf(), progress.clone());
        pipeline = pipeline.with_chunk_hook(Box::new(move |chunk: &Chunk, breakdown: &Breakdown| {
            match save_chunk_result(chunk, breakdown, &source, &dir) {
                Ok(path) => debug!(?path, "cmd_process: saved chunk result"),
                Err(e) => {
                    warn!(chunk = chunk.index(), error = %e, "cmd_process: failed to save chunk result");
                    sink.warn(&format!("Failed to save chunk {} result: {}", chunk.index(), e));
                }
            }
        }));
    }

    let creating = mode == ProcessingMode::Full && !dry_run;
    let mut coordinator = if creating {
        Some(build_coordinator(config, progress.clone())?)
    } else {
        None
    };

    let save = mode == ProcessingMode::AnalyzeOnly || config.processing.save_intermediate;
    let (source, sink, project_key) = (input.to_path_buf(), progress.clone(), config.jira.project_key.clone());
    pipeline = pipeline.with_review(move |breakdown| {
        if save {
            let saved = save_analysis(breakdown, &source, &output_dir, mode).map_err(|e| format!("{:#}", e))?;
            sink.success(&format!("Analysis saved to {}", saved.analysis_path.display()));
            sink.success(&format!("Summary saved to {}", saved.summary_path.display()));
        }
        print!("{}", render_breakdown(breakdown));
        if !creating {
            return Ok(true);
        }
        approve_creation(breakdown, &project_key, yes, sink.as_ref()).map_err(|e| format!("{:#}", e))
    });

    match pipeline.run_file(input, coordinator.as_mut(), dry_run).await {
        Ok(outcome) => {
            if let Some(report) = &outcome.report {
                print!("{}", render_creation_report(report));
            }
            Ok(())
        }
        Err(PipelineError::Tickets(e)) => Err(creation_failed(e, config)),
        Err(e) => Err(e.into()),
    }
}

async fn cmd_create_from_analysis(
    config: &Config,
    file: &Path,
    dry_run: bool,
    yes: bool,
    progress: Arc<dyn ProgressSink>,
) -> Result<()> {
    debug!(?file, dry_run, yes, "cmd_create_from_analysis: called");
    config.validate_for(ProcessingMode::Full, false, dry_run)?;

    let breakdown = load_analysis(file)?;
    progress.info(&format!("Loaded analysis from {}", file.display()));
    print!("{}", render_breakdown(&breakdown));

    if dry_run {
        progress.info("Dry run: skipping ticket creation");
        return Ok(());
    }
    if !approve_creation(&breakdown, &config.jira.project_key, yes, progress.as_ref())? {
        progress.info("Ticket creation skipped");
        return Ok(());
    }

    let mut coordinator = build_coordinator(config, progress)?;
    match coordinator.run(&breakdown).await {
        Ok(report) => {
            print!("{}", render_creation_report(&report));
            Ok(())
        }
        Err(e) => Err(creation_failed(e, config)),
    }
}

fn build_coordinator(config: &Config, progress: Arc<dyn ProgressSink>) -> Result<TicketCoordinator> {
    debug!(project_key = %config.jira.project_key, "build_coordinator: called");
    let tracker: Arc<dyn IssueTracker> =
        Arc::new(JiraClient::from_config(&config.jira).context("Failed to create Jira client")?);
    Ok(TicketCoordinator::new(tracker, config.jira.project_key.clone(), progress)
        .with_pacing(Pacing::new(config.jira.story_pause(), config.jira.epic_pause())))
}

/// Decide whether `breakdown` should be filed; empty breakdowns never are
fn approve_creation(breakdown: &Breakdown, project_key: &str, yes: bool, progress: &dyn ProgressSink) -> Result<bool> {
    debug!(epics = breakdown.total_epics, yes, "approve_creation: called");
    if breakdown.epics.is_empty() {
        progress.warn("Nothing to create: the breakdown has no epics");
        return Ok(false);
    }
    if yes {
        return Ok(true);
    }
    let prompt = format!(
        "Create {} epics and {} stories in Jira project {}? [y/N] ",
        breakdown.total_epics, breakdown.total_stories, project_key
    );
    confirm(&prompt)
}

/// Turn a coordinator failure into the CLI error, showing what was already filed
fn creation_failed(err: CreationError, config: &Config) -> eyre::Report {
    if let CreationError::Epic { partial, .. } = &err
        && partial.total_created() > 0
    {
        print!("{}", render_creation_report(partial));
    }

    if err.is_connectivity() {
        let hint = format!(
            "Could not use Jira project {}; check jira.base-url, jira.username and {}",
            config.jira.project_key, config.jira.api_token_env
        );
        eyre::Report::new(err).wrap_err(hint)
    } else {
        eyre::Report::new(err).wrap_err("Ticket creation failed")
    }
}

/// Ask a y/N question on the terminal; anything but yes declines
fn confirm(prompt: &str) -> Result<bool> {
    debug!("confirm: called");
    let mut editor = rustyline::DefaultEditor::new().context("Failed to open terminal prompt")?;
    match editor.readline(prompt) {
        Ok(answer) => Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(false),
        Err(e) => Err(e).context("Failed to read confirmation"),
    }
}

fn cmd_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    debug!(?config_path, force, "cmd_init: called");
    let path = config_path.cloned().unwrap_or_else(|| PathBuf::from(".scrummaster.yml"));
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::sample().save(&path)?;
    info!(path = %path.display(), "cmd_init: wrote sample config");
    println!("Wrote sample config to {}", path.display());
    println!("Set ANTHROPIC_API_KEY and JIRA_API_TOKEN before running `sm process`.");
    Ok(())
}
