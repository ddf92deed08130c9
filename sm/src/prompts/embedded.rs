//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Whole-document breakdown prompt
pub const BREAKDOWN: &str = include_str!("../../prompts/breakdown.pmt");

/// Per-chunk breakdown prompt for oversized input
pub const CHUNK: &str = include_str!("../../prompts/chunk.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "breakdown" => Some(BREAKDOWN),
        "chunk" => Some(CHUNK),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
