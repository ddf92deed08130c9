//! Jira REST v2 client

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::{CreatedIssue, IssueKind, IssueTracker, NewIssue, ProjectInfo, TrackerError};
use crate::config::JiraConfig;

/// Jira client authenticating with username + API token
pub struct JiraClient {
    base_url: String,
    username: String,
    api_token: String,
    http: Client,
}

impl JiraClient {
    /// Create a client from configuration, reading the token from the environment
    pub fn from_config(config: &JiraConfig) -> Result<Self, TrackerError> {
        debug!(base_url = %config.base_url, username = %config.username, "from_config: called");
        let api_token = config.get_api_token().map_err(|e| TrackerError::Config(e.to_string()))?;
        Self::new(&config.base_url, &config.username, api_token, config.timeout())
    }

    pub fn new(
        base_url: &str,
        username: &str,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TrackerError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            api_token: api_token.into(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TrackerError> {
        let url = self.url(path);
        debug!(%url, "get_json: called");
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.api_token))
            .header("Accept", "application/json")
            .send()
            .await?;
        decode(expect_status(response, StatusCode::OK).await?).await
    }
}

/// Fail with status and raw body unless the response has `expected` status
async fn expect_status(response: Response, expected: StatusCode) -> Result<Response, TrackerError> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), %body, "expect_status: unexpected status");
    Err(TrackerError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TrackerError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| TrackerError::Decode(e.to_string()))
}

// Jira request payload

#[derive(Debug, Serialize)]
struct IssuePayload<'a> {
    fields: IssueFields<'a>,
}

#[derive(Debug, Serialize)]
struct IssueFields<'a> {
    project: KeyRef<'a>,
    summary: &'a str,
    description: &'a str,
    issuetype: NameRef<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<KeyRef<'a>>,
}

#[derive(Debug, Serialize)]
struct KeyRef<'a> {
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct NameRef<'a> {
    name: &'a str,
}

impl<'a> From<&'a NewIssue> for IssuePayload<'a> {
    fn from(issue: &'a NewIssue) -> Self {
        // Epics are top level; a parent link is only sent for child issues
        let parent = match issue.kind {
            IssueKind::Epic => None,
            IssueKind::Task => issue.parent_key.as_deref().map(|key| KeyRef { key }),
        };
        Self {
            fields: IssueFields {
                project: KeyRef { key: &issue.project_key },
                summary: &issue.summary,
                description: &issue.description,
                issuetype: NameRef { name: issue.kind.name() },
                parent,
            },
        }
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn list_accessible_projects(&self) -> Result<Vec<ProjectInfo>, TrackerError> {
        debug!("list_accessible_projects: called");
        self.get_json("project").await
    }

    async fn verify_project_access(&self, project_key: &str) -> Result<(), TrackerError> {
        debug!(%project_key, "verify_project_access: called");
        let _project: ProjectInfo = self.get_json(&format!("project/{}", project_key)).await?;
        Ok(())
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, TrackerError> {
        debug!(kind = %issue.kind, summary = %issue.summary, parent = ?issue.parent_key, "create_issue: called");
        let response = self
            .http
            .post(self.url("issue"))
            .basic_auth(&self.username, Some(&self.api_token))
            .json(&IssuePayload::from(issue))
            .send()
            .await?;
        let created: CreatedIssue = decode(expect_status(response, StatusCode::CREATED).await?).await?;
        debug!(key = %created.key, "create_issue: created");
        Ok(created)
    }
}
