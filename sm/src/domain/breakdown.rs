//! Breakdown tree: a project split into epics and stories

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::Priority;

/// Normalize a title into a merge/dedup key (trimmed, lowercased)
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Treat an explicit JSON `null` like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A leaf unit of work under an epic; becomes a child ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,

    /// Estimate, conventionally 1/2/3/5/8 but not enforced
    #[serde(default, deserialize_with = "null_as_default")]
    pub story_points: u32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub acceptance_criteria: Vec<String>,

    /// Free-text references to other work, not validated
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<String>,
}

impl Story {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            priority: Priority::default(),
            story_points: 0,
            acceptance_criteria: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Dedup key for this story
    pub fn key(&self) -> String {
        normalize_title(&self.title)
    }

    /// Ticket body: description followed by acceptance criteria and dependencies
    pub fn ticket_description(&self) -> String {
        let mut body = format!("{}\n\n*Acceptance Criteria:*\n", self.description);
        for criterion in &self.acceptance_criteria {
            body.push_str(&format!("• {}\n", criterion));
        }
        if !self.dependencies.is_empty() {
            body.push_str(&format!("\n*Dependencies:* {}", self.dependencies.join(", ")));
        }
        body
    }
}

/// A top-level work grouping; becomes a parent ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,

    /// 1-based index of the chunk this epic was first produced from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub stories: Vec<Story>,
}

impl Epic {
    pub fn new(title: impl Into<String>, description: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            priority,
            chunk: None,
            stories: Vec::new(),
        }
    }

    pub fn with_stories(mut self, stories: Vec<Story>) -> Self {
        self.stories = stories;
        self
    }

    /// Merge key for this epic
    pub fn key(&self) -> String {
        normalize_title(&self.title)
    }

    pub fn story_points(&self) -> u32 {
        self.stories.iter().map(|s| s.story_points).sum()
    }
}

/// The full epic/story tree produced for one project description
///
/// The totals are derived from `epics`; they are recomputed after merging and
/// after loading, never trusted from upstream input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    #[serde(default, deserialize_with = "null_as_default")]
    pub project_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub overview: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub epics: Vec<Epic>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub total_epics: usize,

    #[serde(default, deserialize_with = "null_as_default")]
    pub total_stories: usize,

    #[serde(default, deserialize_with = "null_as_default")]
    pub total_story_points: u32,

    /// Number of chunks the source text was processed in
    #[serde(default, deserialize_with = "null_as_default")]
    pub processed_chunks: usize,
}

impl Breakdown {
    /// Build a breakdown with totals computed from `epics`
    pub fn new(
        project_name: impl Into<String>,
        overview: impl Into<String>,
        epics: Vec<Epic>,
        processed_chunks: usize,
    ) -> Self {
        let mut breakdown = Self {
            project_name: project_name.into(),
            overview: overview.into(),
            epics,
            total_epics: 0,
            total_stories: 0,
            total_story_points: 0,
            processed_chunks,
        };
        breakdown.recompute_totals();
        breakdown
    }

    /// Recompute the derived counters from the epic/story tree
    pub fn recompute_totals(&mut self) {
        self.total_epics = self.epics.len();
        self.total_stories = self.epics.iter().map(|e| e.stories.len()).sum();
        self.total_story_points = self.epics.iter().map(Epic::story_points).sum();
        debug!(
            total_epics = self.total_epics,
            total_stories = self.total_stories,
            total_story_points = self.total_story_points,
            "recompute_totals: done"
        );
    }

    /// Check the title invariants of every epic and story
    pub fn validate(&self) -> Result<(), String> {
        for (i, epic) in self.epics.iter().enumerate() {
            if epic.title.trim().is_empty() {
                return Err(format!("Epic {} has an empty title", i + 1));
            }
            for (j, story) in epic.stories.iter().enumerate() {
                if story.title.trim().is_empty() {
                    return Err(format!("Story {} of epic '{}' has an empty title", j + 1, epic.title));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Breakdown {
        let mut login = Story::new("Login page", "As a user, I want to log in");
        login.story_points = 3;
        login.priority = Priority::High;
        login.acceptance_criteria = vec!["Valid credentials succeed".into(), "Bad password shows error".into()];

        let mut reset = Story::new("Password reset", "As a user, I want to reset my password");
        reset.story_points = 5;
        reset.dependencies = vec!["Login page".into()];

        let mut auth = Epic::new("Authentication", "Everything about signing in", Priority::High)
            .with_stories(vec![login, reset]);
        auth.chunk = Some(1);

        let mut profile = Story::new("Edit profile", "As a user, I want to edit my profile");
        profile.story_points = 2;
        let profiles = Epic::new("Profiles", "User profile management", Priority::Low).with_stories(vec![profile]);

        Breakdown::new("Portal", "A customer portal", vec![auth, profiles], 2)
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Login Page "), "login page");
        assert_eq!(normalize_title("login page"), "login page");
    }

    #[test]
    fn test_totals_computed() {
        let b = sample();
        assert_eq!(b.total_epics, 2);
        assert_eq!(b.total_stories, 3);
        assert_eq!(b.total_story_points, 10);
    }

    #[test]
    fn test_recompute_ignores_upstream_totals() {
        let json = r#"{
            "project_name": "X",
            "overview": "Y",
            "total_epics": 99,
            "total_stories": 99,
            "total_story_points": 99,
            "epics": [{"title": "E", "description": "d", "priority": "High",
                       "stories": [{"title": "S", "description": "d", "priority": "Low", "story_points": 8}]}]
        }"#;
        let mut b: Breakdown = serde_json::from_str(json).unwrap();
        b.recompute_totals();
        assert_eq!(b.total_epics, 1);
        assert_eq!(b.total_stories, 1);
        assert_eq!(b.total_story_points, 8);
    }

    #[test]
    fn test_json_round_trip() {
        let original = sample();
        let json = serde_json::to_string_pretty(&original).unwrap();
        let loaded: Breakdown = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_model_shape_defaults() {
        let json = r#"{
            "project_name": "P",
            "overview": "O",
            "epics": [{"title": "E", "description": "d", "priority": "medium",
                       "stories": [{"title": "S", "description": "d", "priority": "HIGH",
                                    "story_points": 3, "acceptance_criteria": ["a"]}]}]
        }"#;
        let b: Breakdown = serde_json::from_str(json).unwrap();
        let story = &b.epics[0].stories[0];
        assert!(story.dependencies.is_empty());
        assert_eq!(story.priority, Priority::High);
        assert_eq!(b.epics[0].chunk, None);
    }

    #[test]
    fn test_chunk_omitted_when_absent() {
        let epic = Epic::new("E", "d", Priority::Low);
        let json = serde_json::to_value(&epic).unwrap();
        assert!(json.get("chunk").is_none());
    }

    #[test]
    fn test_validate_rejects_empty_titles() {
        let mut b = sample();
        assert!(b.validate().is_ok());

        b.epics[1].stories[0].title = "   ".into();
        assert!(b.validate().unwrap_err().contains("Profiles"));

        b.epics[0].title = String::new();
        assert!(b.validate().unwrap_err().contains("Epic 1"));
    }

    #[test]
    fn test_ticket_description() {
        let mut story = Story::new("S", "As a user, I want X");
        story.acceptance_criteria = vec!["first".into(), "second".into()];
        assert_eq!(
            story.ticket_description(),
            "As a user, I want X\n\n*Acceptance Criteria:*\n• first\n• second\n"
        );

        story.dependencies = vec!["A".into(), "B".into()];
        assert!(story.ticket_description().ends_with("\n*Dependencies:* A, B"));
    }
}
