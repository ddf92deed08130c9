//! User-facing progress reporting
//!
//! The pipeline and ticket coordinator report what they are doing through a
//! `ProgressSink` handed to them at construction. `ConsoleProgress` prints
//! colored lines for the CLI; `RecordingProgress` captures messages for tests.

mod console;
mod sink;

pub use console::ConsoleProgress;
pub use sink::{Level, ProgressSink, RecordingProgress};
