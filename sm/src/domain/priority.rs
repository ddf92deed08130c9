//! Priority levels for epics and stories

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Priority level assigned by the model to epics and stories
///
/// Ordered `Low < Medium < High` so that merge escalation is a plain `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Merge an incoming priority into this one
    ///
    /// High always wins, Medium beats Low, and a lower incoming value never
    /// downgrades the existing one.
    pub fn escalate(self, incoming: Priority) -> Priority {
        self.max(incoming)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

// Model output varies in case and vocabulary; anything unrecognized is Medium
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|_| {
            warn!(priority = %raw, "Priority::deserialize: unknown priority, using Medium");
            Self::Medium
        }))
    }
}
