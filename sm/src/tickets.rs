//! Two-phase ticket creation: each epic, then that epic's stories
//!
//! An epic that cannot be created aborts the run; tickets already created
//! stay in place. A story that cannot be created is recorded as skipped and
//! the run continues. Every create call goes through the fixed tracker retry
//! policy (3 attempts, 2 s apart) regardless of configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Breakdown, Epic, Story, normalize_title};
use crate::progress::ProgressSink;
use crate::retry::{RetryError, RetryPolicy, with_retry_notify};
use crate::tracker::{CreatedIssue, IssueKind, IssueTracker, NewIssue, ProjectInfo, TrackerError};

/// Where the coordinator is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    ConnectionVerified,
    CreatingEpics,
    Done,
    Failed,
}

/// Courtesy pauses to stay under tracker rate limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// After each created story
    pub story_pause: Duration,
    /// Between consecutive epics
    pub epic_pause: Duration,
}

impl Pacing {
    pub const fn new(story_pause: Duration, epic_pause: Duration) -> Self {
        Self {
            story_pause,
            epic_pause,
        }
    }

    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_millis(500))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEpic {
    pub title: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedStory {
    pub title: String,
    pub key: String,
    pub parent_key: String,
}

/// A story that failed every attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStory {
    pub epic_title: String,
    pub story_title: String,
    pub error: String,
}

/// Outcome of a creation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationReport {
    pub epics: Vec<CreatedEpic>,
    pub stories: Vec<CreatedStory>,
    pub skipped: Vec<SkippedStory>,
}

impl CreationReport {
    pub fn total_created(&self) -> usize {
        self.epics.len() + self.stories.len()
    }

    /// True when no story had to be skipped
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Fatal creation failures
#[derive(Debug, Error)]
pub enum CreationError {
    #[error("authentication failed: {0}")]
    Authentication(#[source] TrackerError),

    #[error("project key '{key}' not found in accessible projects")]
    ProjectNotFound { key: String, available: Vec<String> },

    #[error("failed to access project '{key}': {source}")]
    ProjectAccess {
        key: String,
        #[source]
        source: TrackerError,
    },

    #[error("failed to create epic '{title}': {source}")]
    Epic {
        title: String,
        #[source]
        source: RetryError<TrackerError>,
        /// Tickets created before the failure
        partial: CreationReport,
    },
}

impl CreationError {
    /// Failure during the pre-check, before anything was created
    pub fn is_connectivity(&self) -> bool {
        !matches!(self, CreationError::Epic { .. })
    }
}

/// Drives an `IssueTracker` through the creation of one breakdown
pub struct TicketCoordinator {
    tracker: Arc<dyn IssueTracker>,
    progress: Arc<dyn ProgressSink>,
    project_key: String,
    pacing: Pacing,
    retry: RetryPolicy,
    state: CoordinatorState,
    epic_keys: HashMap<String, String>,
}

impl TicketCoordinator {
    pub fn new(tracker: Arc<dyn IssueTracker>, project_key: impl Into<String>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            tracker,
            progress,
            project_key: project_key.into(),
            pacing: Pacing::default(),
            retry: RetryPolicy::tracker(),
            state: CoordinatorState::Idle,
            epic_keys: HashMap::new(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Tracker key of an epic created in this run, looked up by title
    pub fn epic_key(&self, title: &str) -> Option<&str> {
        self.epic_keys.get(&normalize_title(title)).map(String::as_str)
    }

    /// Check credentials and project access before creating anything
    pub async fn verify_connection(&mut self) -> Result<Vec<ProjectInfo>, CreationError> {
        debug!(project_key = %self.project_key, "verify_connection: called");
        let result = self.check_connection().await;
        self.state = match result {
            Ok(_) => CoordinatorState::ConnectionVerified,
            Err(_) => CoordinatorState::Failed,
        };
        result
    }

    async fn check_connection(&self) -> Result<Vec<ProjectInfo>, CreationError> {
        self.progress
            .info("Testing Jira authentication and listing accessible projects...");
        let projects = self
            .tracker
            .list_accessible_projects()
            .await
            .map_err(CreationError::Authentication)?;

        self.progress.success(&format!(
            "Authentication successful! Found {} accessible projects:",
            projects.len()
        ));
        for project in &projects {
            let marker = if project.key == self.project_key { "✓" } else { "•" };
            self.progress
                .info(&format!("  {} {} ({})", marker, project.key, project.name));
        }

        if !projects.iter().any(|p| p.key == self.project_key) {
            self.progress.warn(&format!(
                "Project key '{}' not found in accessible projects",
                self.project_key
            ));
            return Err(CreationError::ProjectNotFound {
                key: self.project_key.clone(),
                available: projects.into_iter().map(|p| p.key).collect(),
            });
        }

        self.progress
            .info(&format!("Testing access to project '{}'...", self.project_key));
        self.tracker
            .verify_project_access(&self.project_key)
            .await
            .map_err(|source| CreationError::ProjectAccess {
                key: self.project_key.clone(),
                source,
            })?;
        self.progress
            .success(&format!("Successfully accessed project '{}'", self.project_key));
        Ok(projects)
    }

    /// Verify the connection (if not done yet) and create every ticket
    pub async fn run(&mut self, breakdown: &Breakdown) -> Result<CreationReport, CreationError> {
        debug!(epics = breakdown.epics.len(), state = ?self.state, "run: called");
        if self.state != CoordinatorState::ConnectionVerified {
            self.verify_connection().await?;
        }

        self.state = CoordinatorState::CreatingEpics;
        self.epic_keys.clear();
        let mut report = CreationReport::default();
        let total = breakdown.epics.len();

        for (i, epic) in breakdown.epics.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing.epic_pause).await;
            }
            self.progress
                .header(&format!("[{}/{}] Creating epic: {}", i + 1, total, epic.title));

            let created = match self.create(epic_issue(&self.project_key, epic)).await {
                Ok(created) => created,
                Err(source) => {
                    self.progress
                        .error(&format!("Failed to create epic '{}': {}", epic.title, source));
                    warn!(title = %epic.title, error = %source, "run: epic failed, aborting");
                    return Err(CreationError::Epic {
                        title: epic.title.clone(),
                        source,
                        partial: report,
                    });
                }
            };

            self.progress.success(&format!("Created epic: {}", created.key));
            self.epic_keys.insert(epic.key(), created.key.clone());
            report.epics.push(CreatedEpic {
                title: epic.title.clone(),
                key: created.key.clone(),
            });

            self.create_stories(epic, &created.key, &mut report).await;
        }

        self.state = CoordinatorState::Done;
        info!(
            epics = report.epics.len(),
            stories = report.stories.len(),
            skipped = report.skipped.len(),
            "run: done"
        );
        Ok(report)
    }

    async fn create_stories(&self, epic: &Epic, epic_key: &str, report: &mut CreationReport) {
        let total = epic.stories.len();
        for (j, story) in epic.stories.iter().enumerate() {
            self.progress
                .info(&format!("  [{}/{}] Creating story: {}", j + 1, total, story.title));

            match self.create(story_issue(&self.project_key, story, epic_key)).await {
                Ok(created) => {
                    self.progress.success(&format!("  Created story: {}", created.key));
                    report.stories.push(CreatedStory {
                        title: story.title.clone(),
                        key: created.key,
                        parent_key: epic_key.to_string(),
                    });
                    tokio::time::sleep(self.pacing.story_pause).await;
                }
                Err(e) => {
                    self.progress
                        .warn(&format!("Failed to create story '{}': {}", story.title, e));
                    report.skipped.push(SkippedStory {
                        epic_title: epic.title.clone(),
                        story_title: story.title.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    async fn create(&self, issue: NewIssue) -> Result<CreatedIssue, RetryError<TrackerError>> {
        let tracker = &self.tracker;
        let progress = &self.progress;
        let issue = &issue;
        let label = format!("create {} '{}'", issue.kind, issue.summary);
        with_retry_notify(
            self.retry,
            &label,
            move |_| tracker.create_issue(issue),
            |failed| {
                progress.warn(&format!(
                    "Attempt {}/{} failed: {}",
                    failed.attempt, failed.max_attempts, failed.error
                ))
            },
        )
        .await
    }
}

fn epic_issue(project_key: &str, epic: &Epic) -> NewIssue {
    NewIssue {
        project_key: project_key.to_string(),
        summary: epic.title.clone(),
        description: epic.description.clone(),
        kind: IssueKind::Epic,
        parent_key: None,
    }
}

fn story_issue(project_key: &str, story: &Story, epic_key: &str) -> NewIssue {
    NewIssue {
        project_key: project_key.to_string(),
        summary: story.title.clone(),
        description: story.ticket_description(),
        kind: IssueKind::Task,
        parent_key: Some(epic_key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;
    use crate::progress::{Level, RecordingProgress};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// In-memory tracker with scripted failures
    #[derive(Default)]
    struct FakeTracker {
        projects: Vec<ProjectInfo>,
        deny_access: bool,
        auth_fails: bool,
        /// Summaries that fail on every attempt
        always_fail: HashSet<String>,
        /// Summaries that fail this many times before succeeding
        flaky: Mutex<HashMap<String, usize>>,
        attempts: Mutex<HashMap<String, usize>>,
        created: Mutex<Vec<NewIssue>>,
    }

    impl FakeTracker {
        fn with_project(key: &str) -> Self {
            Self {
                projects: vec![
                    ProjectInfo {
                        key: "OTHER".into(),
                        name: "Other".into(),
                    },
                    ProjectInfo {
                        key: key.into(),
                        name: "Target".into(),
                    },
                ],
                ..Self::default()
            }
        }

        fn failing(mut self, summary: &str) -> Self {
            self.always_fail.insert(summary.to_string());
            self
        }

        fn flaky(self, summary: &str, failures: usize) -> Self {
            self.flaky.lock().unwrap().insert(summary.to_string(), failures);
            self
        }

        fn created(&self) -> Vec<NewIssue> {
            self.created.lock().unwrap().clone()
        }

        fn attempts(&self, summary: &str) -> usize {
            self.attempts.lock().unwrap().get(summary).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl IssueTracker for FakeTracker {
        async fn list_accessible_projects(&self) -> Result<Vec<ProjectInfo>, TrackerError> {
            if self.auth_fails {
                return Err(TrackerError::Api {
                    status: 401,
                    body: "Unauthorized".into(),
                });
            }
            Ok(self.projects.clone())
        }

        async fn verify_project_access(&self, _project_key: &str) -> Result<(), TrackerError> {
            if self.deny_access {
                return Err(TrackerError::Api {
                    status: 403,
                    body: "Forbidden".into(),
                });
            }
            Ok(())
        }

        async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, TrackerError> {
            *self.attempts.lock().unwrap().entry(issue.summary.clone()).or_default() += 1;

            if self.always_fail.contains(&issue.summary) {
                return Err(TrackerError::Api {
                    status: 500,
                    body: format!("cannot create {}", issue.summary),
                });
            }
            if let Some(remaining) = self.flaky.lock().unwrap().get_mut(&issue.summary)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(TrackerError::Api {
                    status: 503,
                    body: "try later".into(),
                });
            }

            let mut created = self.created.lock().unwrap();
            created.push(issue.clone());
            let n = created.len();
            Ok(CreatedIssue {
                id: format!("{}", 10_000 + n),
                key: format!("{}-{}", issue.project_key, n),
            })
        }
    }

    fn breakdown() -> Breakdown {
        let mut login = Story::new("Login", "As a user, I want to log in");
        login.acceptance_criteria = vec!["Valid credentials work".into()];
        login.dependencies = vec!["Signup".into()];
        let auth = Epic::new("Auth", "Authentication", Priority::High).with_stories(vec![
            login,
            Story::new("Logout", "As a user, I want to log out"),
            Story::new("Reset", "As a user, I want to reset my password"),
        ]);
        let billing = Epic::new("Billing", "Payments", Priority::Medium)
            .with_stories(vec![Story::new("Invoice", "As an admin, I want invoices")]);
        Breakdown::new("Shop", "An online shop", vec![auth, billing], 1)
    }

    fn unpaced(tracker: Arc<FakeTracker>, progress: Arc<RecordingProgress>) -> TicketCoordinator {
        TicketCoordinator::new(tracker, "ACME", progress).with_pacing(Pacing::none())
    }

    #[tokio::test(start_paused = true)]
    async fn test_creates_epics_then_stories() {
        let tracker = Arc::new(FakeTracker::with_project("ACME"));
        let progress = Arc::new(RecordingProgress::new());
        let mut coordinator = unpaced(tracker.clone(), progress);

        let report = coordinator.run(&breakdown()).await.unwrap();

        assert_eq!(coordinator.state(), CoordinatorState::Done);
        assert!(report.is_complete());
        assert_eq!(report.total_created(), 6);

        let created = tracker.created();
        let order: Vec<(&str, IssueKind)> = created.iter().map(|i| (i.summary.as_str(), i.kind)).collect();
        assert_eq!(
            order,
            vec![
                ("Auth", IssueKind::Epic),
                ("Login", IssueKind::Task),
                ("Logout", IssueKind::Task),
                ("Reset", IssueKind::Task),
                ("Billing", IssueKind::Epic),
                ("Invoice", IssueKind::Task),
            ]
        );
        assert!(created.iter().filter(|i| i.kind == IssueKind::Epic).all(|i| i.parent_key.is_none()));
        assert_eq!(created[1].parent_key.as_deref(), Some("ACME-1"));
        assert_eq!(created[5].parent_key.as_deref(), Some("ACME-5"));
        assert_eq!(
            created[1].description,
            "As a user, I want to log in\n\n*Acceptance Criteria:*\n• Valid credentials work\n\n*Dependencies:* Signup"
        );
        assert_eq!(coordinator.epic_key("  billing "), Some("ACME-5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_epic_failure_is_fatal() {
        let tracker = Arc::new(FakeTracker::with_project("ACME").failing("Auth"));
        let progress = Arc::new(RecordingProgress::new());
        let mut coordinator = unpaced(tracker.clone(), progress.clone());
        let start = Instant::now();

        let err = coordinator.run(&breakdown()).await.unwrap_err();

        match &err {
            CreationError::Epic { title, source, partial } => {
                assert_eq!(title, "Auth");
                assert_eq!(source.attempts, 3);
                assert_eq!(partial.total_created(), 0);
            }
            other => panic!("expected epic error, got {other:?}"),
        }
        assert!(!err.is_connectivity());
        assert!(tracker.created().is_empty());
        assert_eq!(tracker.attempts("Auth"), 3);
        assert_eq!(tracker.attempts("Billing"), 0);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
        assert_eq!(coordinator.state(), CoordinatorState::CreatingEpics);
        assert_eq!(progress.at(Level::Error).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_epic_failure_keeps_earlier_tickets() {
        let tracker = Arc::new(FakeTracker::with_project("ACME").failing("Billing"));
        let progress = Arc::new(RecordingProgress::new());
        let mut coordinator = unpaced(tracker.clone(), progress);

        let err = coordinator.run(&breakdown()).await.unwrap_err();

        let CreationError::Epic { partial, .. } = err else {
            panic!("expected epic error");
        };
        assert_eq!(partial.epics.len(), 1);
        assert_eq!(partial.stories.len(), 3);
        assert_eq!(tracker.created().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_story_failure_is_skipped() {
        let tracker = Arc::new(FakeTracker::with_project("ACME").failing("Logout"));
        let progress = Arc::new(RecordingProgress::new());
        let mut coordinator = unpaced(tracker.clone(), progress.clone());

        let report = coordinator.run(&breakdown()).await.unwrap();

        assert_eq!(coordinator.state(), CoordinatorState::Done);
        assert_eq!(report.epics.len(), 2);
        let stories: Vec<&str> = report.stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(stories, vec!["Login", "Reset", "Invoice"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].epic_title, "Auth");
        assert_eq!(report.skipped[0].story_title, "Logout");
        assert!(report.skipped[0].error.contains("cannot create Logout"));
        assert_eq!(tracker.attempts("Logout"), 3);

        let warnings = progress.at(Level::Warn);
        assert!(warnings.iter().any(|w| w.starts_with("Failed to create story 'Logout'")));
        assert_eq!(warnings.iter().filter(|w| w.starts_with("Attempt")).count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retried() {
        let tracker = Arc::new(FakeTracker::with_project("ACME").flaky("Invoice", 2));
        let progress = Arc::new(RecordingProgress::new());
        let mut coordinator = unpaced(tracker.clone(), progress);
        let start = Instant::now();

        let report = coordinator.run(&breakdown()).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(tracker.attempts("Invoice"), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_stories_and_epics() {
        let tracker = Arc::new(FakeTracker::with_project("ACME"));
        let progress = Arc::new(RecordingProgress::new());
        let mut coordinator = TicketCoordinator::new(tracker, "ACME", progress).with_pacing(Pacing::default());
        let start = Instant::now();

        coordinator.run(&breakdown()).await.unwrap();

        // 4 stories x 100ms + 1 gap between epics x 500ms
        assert_eq!(start.elapsed(), Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_missing_project_fails_precheck() {
        let tracker = Arc::new(FakeTracker::with_project("OPS"));
        let progress = Arc::new(RecordingProgress::new());
        let mut coordinator = unpaced(tracker.clone(), progress);

        let err = coordinator.run(&breakdown()).await.unwrap_err();

        assert!(err.is_connectivity());
        match err {
            CreationError::ProjectNotFound { key, available } => {
                assert_eq!(key, "ACME");
                assert_eq!(available, vec!["OTHER".to_string(), "OPS".to_string()]);
            }
            other => panic!("expected ProjectNotFound, got {other:?}"),
        }
        assert_eq!(coordinator.state(), CoordinatorState::Failed);
        assert!(tracker.created().is_empty());
    }

    #[tokio::test]
    async fn test_auth_and_access_failures() {
        let tracker = Arc::new(FakeTracker {
            auth_fails: true,
            ..FakeTracker::with_project("ACME")
        });
        let mut coordinator = unpaced(tracker, Arc::new(RecordingProgress::new()));
        let err = coordinator.verify_connection().await.unwrap_err();
        assert!(matches!(err, CreationError::Authentication(_)));
        assert_eq!(coordinator.state(), CoordinatorState::Failed);

        let tracker = Arc::new(FakeTracker {
            deny_access: true,
            ..FakeTracker::with_project("ACME")
        });
        let mut coordinator = unpaced(tracker.clone(), Arc::new(RecordingProgress::new()));
        let err = coordinator.run(&breakdown()).await.unwrap_err();
        assert!(err.to_string().contains("Forbidden"));
        assert!(tracker.created().is_empty());
    }

    #[tokio::test]
    async fn test_verified_connection_is_not_repeated() {
        let tracker = Arc::new(FakeTracker::with_project("ACME"));
        let progress = Arc::new(RecordingProgress::new());
        let mut coordinator = unpaced(tracker, progress.clone());

        let projects = coordinator.verify_connection().await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(coordinator.state(), CoordinatorState::ConnectionVerified);

        coordinator.run(&Breakdown::default()).await.unwrap();
        let auth_checks = progress
            .at(Level::Info)
            .iter()
            .filter(|m| m.starts_with("Testing Jira authentication"))
            .count();
        assert_eq!(auth_checks, 1);
        assert_eq!(coordinator.state(), CoordinatorState::Done);
    }
}
