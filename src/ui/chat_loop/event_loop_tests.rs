use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::json;
use tokio::sync::mpsc;

use super::event_loop::{apply_and_execute, handle_key, next_actions, KeyOutcome};
use super::executors::{ExecutorContext, LoopControl, SessionWorker};
use crate::core::app::{App, AppAction, AppActionDispatcher, NoticeKind, TurnPhase};
use crate::core::config::{Config, TypingConfig};
use crate::core::message::{ConversationMessage, Role};
use crate::core::provider_client::{
    ProviderClient, ProviderError, ProviderRequest, ProviderResponse,
};
use crate::core::session::{PersistenceError, Session, SessionStore, SessionSummary};
use crate::ui::renderer::ChatView;
use crate::utils::test_utils::{create_test_app_with_config, tool_call};

type Reply = Result<ProviderResponse, ProviderError>;

#[derive(Default)]
struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedClient {
    fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::default(),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Malformed("script exhausted".to_string())))
    }
}

#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Vec<Session>>,
}

impl SessionStore for MemoryStore {
    fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        self.saved.lock().unwrap().push(session.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Session, PersistenceError> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|session| session.id == id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    fn latest(&self) -> Result<Option<Session>, PersistenceError> {
        Ok(self.saved.lock().unwrap().last().cloned())
    }

    fn list(&self) -> Result<Vec<SessionSummary>, PersistenceError> {
        let saved = self.saved.lock().unwrap();
        let mut summaries: Vec<SessionSummary> = Vec::new();
        for session in saved.iter().rev() {
            if !summaries.iter().any(|summary| summary.id == session.id) {
                summaries.push(SessionSummary::from(session));
            }
        }
        Ok(summaries)
    }
}

struct Harness {
    app: App,
    ctx: ExecutorContext,
    action_rx: mpsc::UnboundedReceiver<AppAction>,
    client: Arc<ScriptedClient>,
    store: Arc<MemoryStore>,
    worker_handle: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self::with_store(replies, MemoryStore::default())
    }

    fn with_store(replies: impl IntoIterator<Item = Reply>, store: MemoryStore) -> Self {
        let config = Config {
            typing: TypingConfig {
                chars_per_tick: Some(1000),
                tick_ms: Some(1),
            },
            ..Config::default()
        };
        let app = create_test_app_with_config(config);
        let client = ScriptedClient::new(replies);
        let store = Arc::new(store);
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let dispatcher = AppActionDispatcher::new(action_tx);
        let (sessions, worker_handle) = SessionWorker::spawn(store.clone(), dispatcher.clone());
        let ctx = ExecutorContext::new(dispatcher, client.clone(), app.executor.clone(), sessions);
        Self {
            app,
            ctx,
            action_rx,
            client,
            store,
            worker_handle,
        }
    }

    fn submit(&mut self, text: &str) -> LoopControl {
        apply_and_execute(
            &mut self.app,
            &self.ctx,
            vec![AppAction::SubmitInput {
                text: text.to_string(),
            }],
        )
    }

    async fn pump_once(&mut self) {
        let actions = tokio::time::timeout(Duration::from_secs(5), next_actions(&mut self.action_rx))
            .await
            .expect("background task never reported back")
            .expect("action channel closed");
        apply_and_execute(&mut self.app, &self.ctx, actions);
    }

    async fn run_until_idle(&mut self) {
        while self.app.turn.phase != TurnPhase::Idle {
            self.pump_once().await;
        }
    }

    /// Flushes pending saves and returns the newest stored snapshot.
    async fn finish(self) -> Option<Session> {
        drop(self.ctx);
        self.worker_handle.await.expect("session worker");
        self.store.latest().unwrap()
    }
}

fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
    KeyEvent::new(code, modifiers)
}

#[tokio::test]
async fn tool_round_trip_runs_through_background_tasks() {
    let mut harness = Harness::new([
        Ok(ProviderResponse::with_tool_calls(vec![tool_call(
            "call_1",
            "add",
            json!({"a": 2, "b": 2}),
        )])),
        Ok(ProviderResponse::text("2 + 2 = 4")),
    ]);

    assert_eq!(harness.submit("what is 2+2?"), LoopControl::Continue);
    harness.run_until_idle().await;

    let roles: Vec<Role> = harness
        .app
        .session
        .messages
        .iter()
        .map(|message| message.role)
        .collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(harness.app.session.messages[2].content, "4");
    assert_eq!(
        harness.app.session.messages[2].tool_call_id.as_deref(),
        Some("call_1")
    );
    assert_eq!(harness.app.visible_content(3), "2 + 2 = 4");
    assert!(harness.app.typing.is_none());

    let requests = harness.client.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].tools.is_some());
    assert_eq!(requests[1].messages.len(), 3);

    let saved = harness.finish().await.expect("session saved");
    assert_eq!(saved.messages.len(), 4);
}

#[tokio::test]
async fn parallel_tool_results_keep_request_order() {
    let mut harness = Harness::new([
        Ok(ProviderResponse::with_tool_calls(vec![
            tool_call("a", "base64_encode", json!({"text": "hi"})),
            tool_call("b", "echo", json!({"message": "second"})),
        ])),
        Ok(ProviderResponse::text("done")),
    ]);

    harness.submit("encode and echo");
    harness.run_until_idle().await;

    let tool_ids: Vec<&str> = harness
        .app
        .session
        .messages
        .iter()
        .filter_map(|message| message.tool_call_id.as_deref())
        .collect();
    assert_eq!(tool_ids, vec!["a", "b"]);
}

#[tokio::test]
async fn provider_failure_returns_to_idle_with_error_notice() {
    let mut harness = Harness::new([Err(ProviderError::Status {
        status: 401,
        body: r#"{"error":{"message":"Invalid API key"}}"#.to_string(),
    })]);

    harness.submit("hello");
    harness.run_until_idle().await;

    let notice = harness.app.notices.last().expect("notice");
    assert_eq!(notice.kind, NoticeKind::Error);
    assert!(notice.text.contains("Invalid API key"));
    assert_eq!(harness.app.session.messages.len(), 1);
}

#[tokio::test]
async fn results_arriving_after_clear_are_discarded() {
    let mut harness = Harness::new([Ok(ProviderResponse::text("too late"))]);

    harness.submit("hello");
    harness.submit("/clear");
    assert_eq!(harness.app.turn.phase, TurnPhase::Idle);

    harness.pump_once().await;

    assert!(harness.app.session.messages.is_empty());
    assert_eq!(harness.app.turn.phase, TurnPhase::Idle);
}

#[tokio::test]
async fn quit_command_stops_the_loop_and_still_saves() {
    let mut harness = Harness::new(Vec::new());
    harness.submit("/endpoint grok");
    assert_eq!(harness.submit("/quit"), LoopControl::Quit);
    assert_eq!(harness.submit("q"), LoopControl::Quit);

    let saved = harness.finish().await.expect("session saved");
    assert_eq!(saved.endpoint, "grok");
}

#[tokio::test]
async fn session_list_and_resume_go_through_the_store() {
    let mut interrupted = Session::new("grok", "grok-4-1-fast");
    interrupted.id = "20250101-120000-abcdef".to_string();
    interrupted.push(ConversationMessage::user("what is 2+2?"));
    interrupted.push(ConversationMessage::assistant_with_tool_calls(
        "",
        vec![tool_call("call_x", "add", json!({"a": 2, "b": 2}))],
    ));
    let store = MemoryStore::default();
    store.save(&interrupted).unwrap();

    let mut harness = Harness::with_store([Ok(ProviderResponse::text("Four."))], store);

    harness.submit("/session list");
    harness.pump_once().await;
    let listing = &harness.app.notices.last().expect("listing").text;
    assert!(listing.contains("20250101-120000-abcdef"));

    harness.submit("/session resume 20250101-120000-abcdef");
    harness.pump_once().await;
    assert_eq!(harness.app.session.id, "20250101-120000-abcdef");
    assert_eq!(harness.app.session.endpoint, "grok");
    let last = harness.app.session.messages.last().expect("repair");
    assert_eq!(last.role, Role::Tool);
    assert_eq!(last.tool_call_id.as_deref(), Some("call_x"));

    harness.submit("hello again");
    harness.run_until_idle().await;
    let request = harness.client.requests().pop().expect("request");
    let answered = request
        .messages
        .iter()
        .any(|message| message.tool_call_id.as_deref() == Some("call_x"));
    assert!(answered);
}

#[tokio::test]
async fn resuming_an_unknown_id_reports_an_error() {
    let mut harness = Harness::new(Vec::new());
    let original = harness.app.session.id.clone();

    harness.submit("/session resume 19990101-000000-000000");
    harness.pump_once().await;

    let notice = harness.app.notices.last().expect("notice");
    assert_eq!(notice.kind, NoticeKind::Error);
    assert!(notice.text.contains("19990101-000000-000000"));
    assert_eq!(harness.app.session.id, original);
}

#[test]
fn enter_submits_and_clears_input() {
    let mut view = ChatView::default();
    view.textarea.insert_str("hello");
    assert_eq!(
        handle_key(&mut view, key(KeyCode::Enter, KeyModifiers::NONE)),
        KeyOutcome::Submit("hello".to_string())
    );
    assert_eq!(view.input_text(), "");
}

#[test]
fn alt_enter_inserts_newline() {
    let mut view = ChatView::default();
    view.textarea.insert_str("line one");
    assert_eq!(
        handle_key(&mut view, key(KeyCode::Enter, KeyModifiers::ALT)),
        KeyOutcome::Edited
    );
    view.textarea.insert_str("line two");
    assert_eq!(view.input_text(), "line one\nline two");
}

#[test]
fn blank_input_is_not_submitted() {
    let mut view = ChatView::default();
    view.textarea.insert_str("   ");
    assert_eq!(
        handle_key(&mut view, key(KeyCode::Enter, KeyModifiers::NONE)),
        KeyOutcome::Ignored
    );
}

#[test]
fn ctrl_c_quits_and_ctrl_d_only_on_empty_input() {
    let mut view = ChatView::default();
    assert_eq!(
        handle_key(&mut view, key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        KeyOutcome::Quit
    );
    assert_eq!(
        handle_key(&mut view, key(KeyCode::Char('d'), KeyModifiers::CONTROL)),
        KeyOutcome::Quit
    );

    view.textarea.insert_str("draft");
    assert_ne!(
        handle_key(&mut view, key(KeyCode::Char('d'), KeyModifiers::CONTROL)),
        KeyOutcome::Quit
    );
}

#[test]
fn page_keys_scroll_the_transcript() {
    let mut view = ChatView::default();
    handle_key(&mut view, key(KeyCode::PageUp, KeyModifiers::NONE));
    handle_key(&mut view, key(KeyCode::PageUp, KeyModifiers::NONE));
    handle_key(&mut view, key(KeyCode::PageDown, KeyModifiers::NONE));
    assert!(view.scroll_back > 0);
    handle_key(&mut view, key(KeyCode::PageDown, KeyModifiers::NONE));
    assert_eq!(view.scroll_back, 0);
}
