//! ProgressSink trait definition

use std::sync::Mutex;

use tracing::debug;

/// Severity of a progress message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Header,
    Info,
    Success,
    Warn,
    Error,
}

/// User-facing reporting capability injected into the pipeline
///
/// Implementations decide how (or whether) messages are shown. The core never
/// prints directly, so it can run without a terminal.
pub trait ProgressSink: Send + Sync {
    /// Emit one message at the given level
    fn emit(&self, level: Level, message: &str);

    fn header(&self, message: &str) {
        self.emit(Level::Header, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn success(&self, message: &str) {
        self.emit(Level::Success, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }
}

/// Sink that keeps every message in memory
#[derive(Debug, Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages in emission order
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Recorded messages at one level
    pub fn at(&self, level: Level) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, level: Level, message: &str) {
        debug!(?level, %message, "RecordingProgress::emit: called");
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}
