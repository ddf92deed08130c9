//! Colored terminal progress output

use colored::Colorize;

use super::{Level, ProgressSink};

/// Writes progress to stdout (stderr for errors) with color per level
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ConsoleProgress {
    pub fn new() -> Self {
        Self
    }

    /// Style a message the way it would be printed
    pub fn style(level: Level, message: &str) -> String {
        match level {
            Level::Header => message.magenta().bold().to_string(),
            Level::Info => message.cyan().to_string(),
            Level::Success => format!("{} {}", "✓".green().bold(), message.green()),
            Level::Warn => format!("{} {}", "!".yellow().bold(), message.yellow()),
            Level::Error => format!("{} {}", "✗".red().bold(), message.red().bold()),
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn emit(&self, level: Level, message: &str) {
        let line = Self::style(level, message);
        match level {
            Level::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}
