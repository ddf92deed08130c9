//! Issue tracker capability and its Jira implementation
//!
//! The ticket coordinator only sees `IssueTracker`; `JiraClient` speaks the
//! Jira REST v2 API with basic auth.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod jira;

pub use jira::JiraClient;

/// Kind of issue to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    Epic,
    Task,
}

impl IssueKind {
    /// Issue type name as the tracker knows it
    pub fn name(&self) -> &'static str {
        match self {
            IssueKind::Epic => "Epic",
            IssueKind::Task => "Task",
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A ticket to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub kind: IssueKind,
    /// Parent ticket key; never sent for epics
    pub parent_key: Option<String>,
}

/// Identity of a created ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}

/// A project visible to the authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

/// Errors from tracker calls
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Jira API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("tracker configuration error: {0}")]
    Config(String),
}

/// Ticket operations needed to file a breakdown
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Projects the credentials can see
    async fn list_accessible_projects(&self) -> Result<Vec<ProjectInfo>, TrackerError>;

    /// Succeeds when the project can be read
    async fn verify_project_access(&self, project_key: &str) -> Result<(), TrackerError>;

    /// Create one ticket
    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, TrackerError>;
}
