//! End-to-end integration tests for PaperDesk.
//!
//! These exercise the whole path a user action takes: controller, prompt
//! assembly, relay client, the relay itself, and a mock Anthropic upstream.

use std::sync::{Arc, Mutex};

use axum::{Json, Router, http::HeaderMap, routing::post};
use paperdesk_assistant::narration::UnavailableSpeechEngine;
use paperdesk_assistant::{Action, Assistant, NoticeLevel};
use paperdesk_config::AppConfig;
use paperdesk_core::error::UpstreamError;
use paperdesk_core::message::{MessagesRequest, MessagesResponse};
use paperdesk_core::ModelClient;
use paperdesk_providers::{AnthropicClient, RelayClient};

// ── Mock upstream ────────────────────────────────────────────────────────

/// Everything the mock upstream received: (x-api-key, body).
type Seen = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

/// Answers extraction, analysis and follow-ups with canned text, keyed on
/// the request shape.
async fn spawn_upstream(seen: Seen) -> String {
    let router = Router::new().route(
        "/v1/messages",
        post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
            let seen = seen.clone();
            async move {
                let key = headers
                    .get("x-api-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let content = &body["messages"][0]["content"];
                let text = if content.is_array() {
                    "Paper X content".to_string()
                } else {
                    let prompt = content.as_str().unwrap_or_default();
                    if prompt.starts_with("As a ") {
                        "Initial analysis of Paper X".to_string()
                    } else {
                        let question = prompt
                            .split("CURRENT QUESTION: ")
                            .nth(1)
                            .and_then(|rest| rest.lines().next())
                            .unwrap_or_default();
                        format!("Answer to {question}")
                    }
                };
                seen.lock().unwrap().push((key, body));
                Json(serde_json::json!({
                    "id": "msg_e2e",
                    "content": [{"type": "text", "text": text}],
                    "stop_reason": "end_turn"
                }))
            }
        }),
    );
    serve(router).await
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Start a relay holding `key` in front of the upstream at `upstream`.
async fn spawn_relay(upstream: &str, key: Option<&str>) -> String {
    let mut config = AppConfig::default();
    config.relay.static_dir = std::env::temp_dir()
        .join("paperdesk-e2e-no-ui")
        .display()
        .to_string();
    config.upstream.base_url = upstream.to_string();
    config.api_key = key.map(str::to_string);

    let state = paperdesk_gateway::state_from_config(&config).unwrap();
    let router = paperdesk_gateway::build_router(state, &config.relay);
    serve(router).await
}

fn pdf(name: &str) -> Action {
    Action::Upload {
        file_name: name.into(),
        media_type: "application/pdf".into(),
        bytes: b"%PDF-1.4 e2e".to_vec(),
    }
}

fn quiet_assistant(client: Arc<dyn ModelClient>) -> Assistant {
    Assistant::new(
        client,
        Arc::new(UnavailableSpeechEngine::new("tests")),
        &AppConfig::default(),
    )
}

// ── Scripted client ──────────────────────────────────────────────────────

/// A client that returns scripted replies in sequence.
struct ScriptedClient {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<MessagesRequest>>,
}

impl ScriptedClient {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_prompt(&self) -> String {
        let prompts = self.prompts.lock().unwrap();
        let req = prompts.last().unwrap();
        serde_json::to_value(req).unwrap()["messages"][0]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn complete(&self, request: MessagesRequest) -> Result<MessagesResponse, UpstreamError> {
        self.prompts.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop().unwrap_or_else(|| {
            panic!("ScriptedClient exhausted");
        });
        Ok(serde_json::from_value(serde_json::json!({
            "content": [{"type": "text", "text": reply}]
        }))
        .unwrap())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_through_relay_to_upstream() {
    let seen: Seen = Arc::default();
    let upstream = spawn_upstream(seen.clone()).await;
    let relay = spawn_relay(&upstream, Some("sk-ant-server")).await;

    let client = Arc::new(RelayClient::new(relay, None).unwrap());
    let assistant = quiet_assistant(client);

    let report = assistant.perform(pdf("Paper X.pdf")).await;
    assert!(!report.failed(), "{:?}", report.notices);

    let report = assistant.perform(Action::Analyze).await;
    assert_eq!(report.reply.as_deref(), Some("Initial analysis of Paper X"));

    let report = assistant.perform(Action::Ask("What is the baseline?".into())).await;
    assert_eq!(report.reply.as_deref(), Some("Answer to What is the baseline?"));

    let status = assistant.status();
    assert_eq!(status.paper_title, "Paper X");
    assert_eq!(status.summary, "Discussion includes 1 questions about Paper X");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(key, _)| key == "sk-ant-server"));
    // relay forwards the per-call budgets set by the assistant
    let budgets: Vec<u64> = seen.iter().map(|(_, b)| b["max_tokens"].as_u64().unwrap()).collect();
    assert_eq!(budgets, vec![4000, 3000, 2000]);
    assert_eq!(seen[0].1["messages"][0]["content"][0]["type"], "document");
}

#[tokio::test]
async fn e2e_relay_without_key_surfaces_notice() {
    let seen: Seen = Arc::default();
    let upstream = spawn_upstream(seen.clone()).await;
    let relay = spawn_relay(&upstream, None).await;

    let assistant = quiet_assistant(Arc::new(RelayClient::new(relay, None).unwrap()));
    let report = assistant.perform(pdf("paper.pdf")).await;

    assert!(report.failed());
    assert_eq!(report.notices[0].level, NoticeLevel::Error);
    assert!(report.notices[0].message.contains("ANTHROPIC_API_KEY not configured"));
    assert!(!assistant.status().has_paper);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn e2e_direct_client() {
    let seen: Seen = Arc::default();
    let upstream = spawn_upstream(seen.clone()).await;
    let client = Arc::new(AnthropicClient::new("sk-ant-local", None).unwrap().with_base_url(upstream));
    let assistant = quiet_assistant(client);

    assistant.perform(pdf("local.pdf")).await;
    let report = assistant.perform(Action::Analyze).await;
    assert_eq!(report.reply.as_deref(), Some("Initial analysis of Paper X"));
    assert_eq!(seen.lock().unwrap()[0].0, "sk-ant-local");
}

#[tokio::test]
async fn e2e_history_grows_with_every_question() {
    let client = ScriptedClient::new(&["Paper X content", "Initial thoughts", "A1", "A2", "A3"]);
    let assistant = quiet_assistant(client.clone());

    assistant.perform(pdf("Paper X.pdf")).await;
    assistant.perform(Action::Analyze).await;
    for q in ["Q1", "Q2", "Q3"] {
        assistant.perform(Action::Ask(q.into())).await;
    }

    let prompt = client.last_prompt();
    let expected = [
        "Paper Title: Paper X",
        "INITIAL ANALYSIS:\nInitial thoughts",
        "Previous Question: Q1",
        "Previous Answer: A1",
        "Previous Question: Q2",
        "Previous Answer: A2",
        "CURRENT QUESTION: Q3",
        "Instructions:",
    ];
    let positions: Vec<usize> = expected.iter().map(|e| prompt.find(e).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(!prompt.contains("Previous Answer: A3"));
}

#[tokio::test]
async fn e2e_transcript_and_reset() {
    let client = ScriptedClient::new(&["text", "Overview", "It uses matrix factorization."]);
    let assistant = quiet_assistant(client);

    assistant.perform(pdf("survey.pdf")).await;
    assistant.perform(Action::Analyze).await;
    assistant.perform(Action::Ask("Which model?".into())).await;

    let transcript = assistant.snapshot().session.transcript();
    assert!(transcript.starts_with("# survey\n"));
    assert!(transcript.contains("## Initial Analysis\n\nOverview\n"));
    assert!(transcript.contains("## Q1: Which model?"));
    assert!(transcript.contains("It uses matrix factorization."));

    let report = assistant.perform(Action::Reset).await;
    assert!(!report.failed());
    let status = assistant.status();
    assert!(!status.has_paper);
    assert_eq!(status.question_count, 0);
    assert_eq!(status.epoch, 1);
}

#[tokio::test]
async fn e2e_non_pdf_rejected() {
    let client = ScriptedClient::new(&[]);
    let assistant = quiet_assistant(client.clone());

    let report = assistant
        .perform(Action::Upload {
            file_name: "notes.docx".into(),
            media_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document".into(),
            bytes: vec![1, 2, 3],
        })
        .await;
    assert!(report.failed());
    assert!(client.prompts.lock().unwrap().is_empty());
}
