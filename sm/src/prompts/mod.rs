//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files.
//!
//! Template loading chain:
//! 1. `.scrummaster/prompts/{name}.pmt` (user override)
//! 2. `prompts/{name}.pmt` (repo default)
//! 3. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution. Source text is
//! inserted with `{{{content}}}` so it is not HTML-escaped.

pub mod embedded;
mod loader;

pub use loader::{PromptContext, PromptLoader};
