//! Pipeline driver: chunk, analyze, merge, and optionally file tickets
//!
//! Chunks are processed strictly in order. Each chunk's provider call runs
//! under the configured retry policy; a chunk that still fails aborts the run.
//! Project name and overview come from the first chunk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::chunker::{self, Chunk};
use crate::config::LlmConfig;
use crate::domain::Breakdown;
use crate::merge::merge_epics;
use crate::progress::ProgressSink;
use crate::provider::{BreakdownProvider, ProviderError};
use crate::retry::{RetryError, RetryPolicy, with_retry_notify};
use crate::tickets::{CreationError, CreationReport, TicketCoordinator};

/// Fatal pipeline failures
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read input file {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input is empty")]
    EmptyInput,

    #[error("failed to process chunk {chunk}/{total}: {source}")]
    Provider {
        chunk: usize,
        total: usize,
        #[source]
        source: RetryError<ProviderError>,
    },

    #[error("breakdown review failed: {0}")]
    Review(String),

    #[error("ticket creation failed: {0}")]
    Tickets(#[from] CreationError),
}

/// Knobs for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Soft chunk size limit in characters
    pub chunk_size_chars: usize,
    /// Retry policy for each chunk's provider call
    pub retry: RetryPolicy,
    /// Pause between consecutive chunk calls
    pub chunk_delay: Duration,
}

impl PipelineConfig {
    pub fn from_llm(config: &LlmConfig) -> Self {
        Self {
            chunk_size_chars: config.chunk_size_chars,
            retry: config.retry_policy(),
            chunk_delay: config.chunk_delay(),
        }
    }
}

/// Callback run with each chunk's raw breakdown before merging
pub type ChunkHook = Box<dyn Fn(&Chunk, &Breakdown) + Send + Sync>;

/// Callback run with the merged breakdown before any ticket is filed.
/// `Ok(false)` skips creation; `Err` aborts the run.
pub type ReviewHook = Box<dyn Fn(&Breakdown) -> Result<bool, String> + Send + Sync>;

/// Result of a full run
#[derive(Debug)]
pub struct PipelineOutcome {
    pub breakdown: Breakdown,
    /// `None` for dry runs and runs without a coordinator
    pub report: Option<CreationReport>,
}

pub struct Pipeline {
    config: PipelineConfig,
    provider: Arc<dyn BreakdownProvider>,
    progress: Arc<dyn ProgressSink>,
    chunk_hook: Option<ChunkHook>,
    review: Option<ReviewHook>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, provider: Arc<dyn BreakdownProvider>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            config,
            provider,
            progress,
            chunk_hook: None,
            review: None,
        }
    }

    /// Observe each chunk's result (e.g. to save intermediate files)
    pub fn with_chunk_hook(mut self, hook: ChunkHook) -> Self {
        self.chunk_hook = Some(hook);
        self
    }

    /// Inspect (and approve) the merged breakdown before tickets are filed
    pub fn with_review(mut self, hook: impl Fn(&Breakdown) -> Result<bool, String> + Send + Sync + 'static) -> Self {
        self.review = Some(Box::new(hook));
        self
    }

    /// Read a project description from disk and analyze it
    pub async fn analyze_file(&self, path: &Path) -> Result<Breakdown, PipelineError> {
        debug!(path = %path.display(), "analyze_file: called");
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PipelineError::Input {
                path: path.to_path_buf(),
                source,
            })?;
        self.progress
            .info(&format!("Read {} bytes from {}", text.len(), path.display()));
        self.analyze(&text).await
    }

    /// Produce one merged breakdown for `text`
    pub async fn analyze(&self, text: &str) -> Result<Breakdown, PipelineError> {
        debug!(text_len = text.len(), "analyze: called");
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let chunks = chunker::split(text, self.config.chunk_size_chars);
        let total = chunks.len();
        self.progress
            .info(&format!("Processing with AI ({} chunks)...", total));

        let mut project_name = String::new();
        let mut overview = String::new();
        let mut all_epics = Vec::new();

        for chunk in &chunks {
            if chunk.index() > 1 && !self.config.chunk_delay.is_zero() {
                tokio::time::sleep(self.config.chunk_delay).await;
            }

            let result = self.analyze_chunk(chunk).await?;
            if let Some(hook) = &self.chunk_hook {
                hook(chunk, &result);
            }

            if chunk.index() == 1 {
                project_name = result.project_name;
                overview = result.overview;
            }
            all_epics.extend(result.epics.into_iter().map(|mut epic| {
                epic.chunk = Some(chunk.index());
                epic
            }));
        }

        let breakdown = Breakdown::new(project_name, overview, merge_epics(all_epics), total);
        info!(
            chunks = total,
            epics = breakdown.total_epics,
            stories = breakdown.total_stories,
            "analyze: done"
        );
        self.progress.success(&format!(
            "AI processing complete - {} chunks processed, {} epics found",
            total, breakdown.total_epics
        ));
        Ok(breakdown)
    }

    async fn analyze_chunk(&self, chunk: &Chunk) -> Result<Breakdown, PipelineError> {
        let (index, total) = (chunk.index(), chunk.total());
        let max_attempts = self.config.retry.max_attempts.max(1);
        let provider = &self.provider;
        let progress = &self.progress;

        with_retry_notify(
            self.config.retry,
            &format!("chunk {}/{}", index, total),
            move |attempt| {
                progress.info(&format!(
                    "Processing chunk {}/{} (attempt {}/{})...",
                    index, total, attempt, max_attempts
                ));
                provider.breakdown(chunk)
            },
            |failed| {
                progress.warn(&format!("Attempt {} failed: {}", failed.attempt, failed.error));
                if let Some(delay) = failed.retry_in {
                    progress.info(&format!("Retrying in {} ms...", delay.as_millis()));
                }
            },
        )
        .await
        .map_err(|source| PipelineError::Provider {
            chunk: index,
            total,
            source,
        })
    }

    /// Analyze `text` and, unless `dry_run`, file the result through `coordinator`
    pub async fn run(
        &self,
        text: &str,
        coordinator: Option<&mut TicketCoordinator>,
        dry_run: bool,
    ) -> Result<PipelineOutcome, PipelineError> {
        debug!(dry_run, has_coordinator = coordinator.is_some(), "run: called");
        let breakdown = self.analyze(text).await?;
        self.finish(breakdown, coordinator, dry_run).await
    }

    /// Like [`Pipeline::run`], reading the description from `path`
    pub async fn run_file(
        &self,
        path: &Path,
        coordinator: Option<&mut TicketCoordinator>,
        dry_run: bool,
    ) -> Result<PipelineOutcome, PipelineError> {
        debug!(path = %path.display(), dry_run, has_coordinator = coordinator.is_some(), "run_file: called");
        let breakdown = self.analyze_file(path).await?;
        self.finish(breakdown, coordinator, dry_run).await
    }

    async fn finish(
        &self,
        breakdown: Breakdown,
        coordinator: Option<&mut TicketCoordinator>,
        dry_run: bool,
    ) -> Result<PipelineOutcome, PipelineError> {
        let approved = match &self.review {
            Some(review) => review(&breakdown).map_err(PipelineError::Review)?,
            None => true,
        };

        let report = match coordinator {
            _ if dry_run => {
                self.progress.info("Dry run: skipping ticket creation");
                None
            }
            Some(_) if !approved => {
                self.progress.info("Ticket creation skipped");
                None
            }
            Some(coordinator) => Some(coordinator.run(&breakdown).await?),
            None => None,
        };

        Ok(PipelineOutcome { breakdown, report })
    }
}
