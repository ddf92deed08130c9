//! Scrummaster - project descriptions to Jira epics and stories
//!
//! Scrummaster reads a free-form project description, asks an LLM to break it
//! into epics and user stories, merges the per-chunk answers into one
//! breakdown, and files the result in Jira as epics with child tasks.
//!
//! # Core Concepts
//!
//! - **Chunked analysis**: long descriptions are split on line boundaries and
//!   analyzed in order; epics with the same title are merged across chunks
//! - **Retry at the seams**: every LLM and tracker call runs under a bounded
//!   retry policy; a failed story is skipped, a failed epic aborts
//! - **Injected capabilities**: the pipeline sees `BreakdownProvider`,
//!   `IssueTracker` and `ProgressSink` traits, never concrete clients
//!
//! # Modules
//!
//! - [`chunker`] - Line-respecting text splitting
//! - [`domain`] - Breakdown, epic, story and priority types
//! - [`merge`] - Cross-chunk epic and story deduplication
//! - [`retry`] - Bounded retry with fixed delay
//! - [`llm`] - LLM client trait with Anthropic and OpenAI implementations
//! - [`prompts`] - Handlebars prompt templates with file overrides
//! - [`provider`] - LLM-backed breakdown provider and response parsing
//! - [`tracker`] - Issue tracker trait and Jira client
//! - [`tickets`] - Ticket creation coordinator
//! - [`pipeline`] - End-to-end driver
//! - [`output`] - Analysis files on disk
//! - [`report`] - Terminal rendering
//! - [`progress`] - User-facing progress sinks
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod chunker;
pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod report;
pub mod retry;
pub mod tickets;
pub mod tracker;

// Re-export commonly used types
pub use config::{Config, JiraConfig, LlmConfig, ProcessingMode};
pub use domain::{Breakdown, Epic, Priority, Story};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOutcome};
pub use progress::{ConsoleProgress, ProgressSink, RecordingProgress};
pub use provider::{BreakdownProvider, LlmBreakdownProvider, ProviderError};
pub use retry::{RetryError, RetryPolicy, with_retry};
pub use tickets::{CreationError, CreationReport, TicketCoordinator};
pub use tracker::{IssueTracker, JiraClient, TrackerError};
