//! Integration tests for Scrummaster
//!
//! These tests drive the pipeline end to end against mocked Anthropic and
//! Jira HTTP endpoints.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use scrummaster::llm::{AnthropicClient, LlmClient};
use scrummaster::pipeline::{Pipeline, PipelineConfig};
use scrummaster::progress::{Level, ProgressSink, RecordingProgress};
use scrummaster::prompts::PromptLoader;
use scrummaster::provider::LlmBreakdownProvider;
use scrummaster::retry::RetryPolicy;
use scrummaster::tickets::{Pacing, TicketCoordinator};
use scrummaster::tracker::{IssueTracker, JiraClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const BREAKDOWN: &str = r#"```json
{
  "project_name": "Bookshop",
  "overview": "Sell books online",
  "epics": [
    {
      "title": "Catalog",
      "description": "Browse books",
      "priority": "high",
      "stories": [
        {"title": "List books", "description": "As a reader, I want a list", "story_points": 3,
         "acceptance_criteria": ["Shows titles"]},
        {"title": "Search", "description": "As a reader, I want to search", "story_points": 5}
      ]
    },
    {
      "title": "Checkout",
      "description": "Pay for books",
      "priority": "medium",
      "stories": [
        {"title": "Cart", "description": "As a buyer, I want a cart", "story_points": 2}
      ]
    }
  ]
}
```"#;

fn anthropic_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 20}
    }))
}

/// Answers every create-issue call with the next `BOOK-<n>` key
struct SequentialKeys(AtomicUsize);

impl Respond for SequentialKeys {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": format!("{}", 10000 + n),
            "key": format!("BOOK-{}", n),
        }))
    }
}

async fn mount_jira(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/api/2/project"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"key": "BOOK", "name": "Bookshop"}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/project/BOOK"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"key": "BOOK", "name": "Bookshop"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .respond_with(SequentialKeys(AtomicUsize::new(0)))
        .mount(server)
        .await;
}

fn pipeline(llm_server: &MockServer, progress: Arc<dyn ProgressSink>) -> Pipeline {
    let llm: Arc<dyn LlmClient> = Arc::new(
        AnthropicClient::new("claude-test", "key", &llm_server.uri(), 4000, Duration::from_secs(5))
            .expect("client builds"),
    );
    let provider = Arc::new(LlmBreakdownProvider::new(llm, PromptLoader::embedded_only(), 4000));
    let config = PipelineConfig {
        chunk_size_chars: 15000,
        retry: RetryPolicy::new(2, Duration::ZERO),
        chunk_delay: Duration::ZERO,
    };
    Pipeline::new(config, provider, progress)
}

fn coordinator(jira_server: &MockServer, progress: Arc<dyn ProgressSink>) -> TicketCoordinator {
    let tracker: Arc<dyn IssueTracker> = Arc::new(
        JiraClient::new(&jira_server.uri(), "dev@books.io", "tok", Duration::from_secs(5)).expect("client builds"),
    );
    TicketCoordinator::new(tracker, "BOOK", progress).with_pacing(Pacing::none())
}

#[tokio::test]
async fn test_description_to_jira_tickets() {
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(anthropic_text(BREAKDOWN))
        .expect(1)
        .mount(&llm_server)
        .await;
    let jira_server = MockServer::start().await;
    mount_jira(&jira_server).await;

    let progress = Arc::new(RecordingProgress::new());
    let mut tickets = coordinator(&jira_server, progress.clone());
    let outcome = pipeline(&llm_server, progress.clone())
        .run("A small online bookshop.\nReaders browse and buy.", Some(&mut tickets), false)
        .await
        .unwrap();

    assert_eq!(outcome.breakdown.project_name, "Bookshop");
    assert_eq!(outcome.breakdown.total_epics, 2);
    assert_eq!(outcome.breakdown.total_stories, 3);
    assert_eq!(outcome.breakdown.total_story_points, 10);

    let report = outcome.report.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.total_created(), 5);
    assert_eq!(tickets.epic_key("Catalog"), Some("BOOK-1"));
    assert_eq!(tickets.epic_key("Checkout"), Some("BOOK-4"));

    // Stories are filed under their epic, epics carry no parent
    let bodies: Vec<serde_json::Value> = jira_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(bodies.len(), 5);
    assert_eq!(bodies[0]["fields"]["issuetype"]["name"], "Epic");
    assert!(bodies[0]["fields"].get("parent").is_none());
    assert_eq!(bodies[1]["fields"]["summary"], "List books");
    assert_eq!(bodies[1]["fields"]["parent"]["key"], "BOOK-1");
    assert_eq!(bodies[4]["fields"]["parent"]["key"], "BOOK-4");

    assert!(progress.at(Level::Error).is_empty());
}

#[tokio::test]
async fn test_dry_run_never_touches_jira() {
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(anthropic_text(BREAKDOWN))
        .mount(&llm_server)
        .await;
    let jira_server = MockServer::start().await;

    let progress = Arc::new(RecordingProgress::new());
    let mut tickets = coordinator(&jira_server, progress.clone());
    let outcome = pipeline(&llm_server, progress.clone())
        .run("A small online bookshop.", Some(&mut tickets), true)
        .await
        .unwrap();

    assert!(outcome.report.is_none());
    assert_eq!(outcome.breakdown.total_epics, 2);
    assert!(jira_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_llm_answer_is_retried() {
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(anthropic_text("I cannot help with that"))
        .up_to_n_times(1)
        .mount(&llm_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(anthropic_text(BREAKDOWN))
        .mount(&llm_server)
        .await;

    let progress = Arc::new(RecordingProgress::new());
    let breakdown = pipeline(&llm_server, progress.clone())
        .analyze("A small online bookshop.")
        .await
        .unwrap();

    assert_eq!(breakdown.total_epics, 2);
    assert_eq!(llm_server.received_requests().await.unwrap().len(), 2);
    assert_eq!(progress.at(Level::Warn).len(), 1);
}

#[tokio::test]
async fn test_unknown_project_fails_before_creating_anything() {
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(anthropic_text(BREAKDOWN))
        .mount(&llm_server)
        .await;
    let jira_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/project"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"key": "OTHER", "name": "Other"}])))
        .mount(&jira_server)
        .await;

    let progress = Arc::new(RecordingProgress::new());
    let mut tickets = coordinator(&jira_server, progress.clone());
    let err = pipeline(&llm_server, progress.clone())
        .run("A small online bookshop.", Some(&mut tickets), false)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("BOOK"));
    let posts = jira_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .count();
    assert_eq!(posts, 0);
}
