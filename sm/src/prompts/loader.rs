//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::chunker::Chunk;

/// Context for rendering prompt templates
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    /// Text of the chunk being analyzed
    pub content: String,
    /// 1-based chunk index
    pub chunk_index: usize,
    /// Number of chunks in the source
    pub total_chunks: usize,
}

impl PromptContext {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            content: chunk.content().to_string(),
            chunk_index: chunk.index(),
            total_chunks: chunk.total(),
        }
    }

    /// Template used for this context
    ///
    /// A source that fit in one chunk gets the whole-document prompt.
    pub fn template_name(&self) -> &'static str {
        if self.total_chunks <= 1 { "breakdown" } else { "chunk" }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.scrummaster/prompts/`)
    user_dir: Option<PathBuf>,
    /// Repo default directory (e.g., `prompts/`)
    repo_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a new prompt loader rooted at `root`
    ///
    /// Looks for `.scrummaster/prompts/` and `prompts/` under the root.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let user_dir = root.join(".scrummaster/prompts");
        let repo_dir = root.join("prompts");
        debug!(?user_dir, ?repo_dir, "PromptLoader::new: called");

        Self {
            hbs: Handlebars::new(),
            user_dir: user_dir.is_dir().then_some(user_dir),
            repo_dir: repo_dir.is_dir().then_some(repo_dir),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Handlebars::new(),
            user_dir: None,
            repo_dir: None,
        }
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `.scrummaster/prompts/{name}.pmt`
    /// 2. Repo default: `prompts/{name}.pmt`
    /// 3. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        for dir in [&self.user_dir, &self.repo_dir].into_iter().flatten() {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found on disk");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        debug!(%template_name, chunk_index = context.chunk_index, total_chunks = context.total_chunks, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// Render the right prompt for one chunk
    pub fn render_for(&self, chunk: &Chunk) -> Result<String> {
        let context = PromptContext::from_chunk(chunk);
        self.render(context.template_name(), &context)
    }
}
