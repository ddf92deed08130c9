//! Line-respecting content chunking
//!
//! Oversized project descriptions are split into chunks that the model can
//! handle in one request. Splits happen only between lines; the size limit is
//! a soft target, so a single line longer than the limit becomes a chunk on
//! its own rather than being cut.

use tracing::debug;

/// A bounded slice of the source text, produced once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    content: String,
    index: usize,
    total: usize,
}

impl Chunk {
    /// The chunk's text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// 1-based position of this chunk
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of chunks the source was split into
    pub fn total(&self) -> usize {
        self.total
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Split `text` into chunks of at most `max_chunk_chars` characters
///
/// Lengths are counted in characters, each line including its trailing
/// newline. Concatenating the chunk contents reproduces `text` exactly.
pub fn split(text: &str, max_chunk_chars: usize) -> Vec<Chunk> {
    let text_len = text.chars().count();
    debug!(text_len, max_chunk_chars, "split: called");

    if text_len <= max_chunk_chars {
        debug!("split: fits in a single chunk");
        return vec![Chunk {
            content: text.to_string(),
            index: 1,
            total: 1,
        }];
    }

    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len > 0 && current_len + line_len > max_chunk_chars {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if current_len > 0 {
        pieces.push(current);
    }

    let total = pieces.len();
    debug!(total, "split: produced chunks");

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, content)| Chunk {
            content,
            index: i + 1,
            total,
        })
        .collect()
}
