//! The conversation orchestrator.
//!
//! [`App`] owns the session and the per-turn state machine. It never performs
//! I/O itself: [`actions::apply_action`] mutates it in response to an
//! [`AppAction`] and hands back [`AppCommand`]s for the chat loop to execute
//! as background tasks, whose completions come back as further actions.

use std::sync::Arc;

use tracing::{info, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::api::ChatMessage;
use crate::core::config::Config;
use crate::core::context::{estimate_tokens, model_context_limit, ContextUsage, WarningLevel};
use crate::core::message::{ConversationMessage, ToolCallRequest};
use crate::core::provider_client::ProviderRequest;
use crate::core::providers::find_provider;
use crate::core::session::Session;
use crate::skills::{ExecutionResult, SkillError, SkillExecutor, SkillRegistry};

pub mod actions;

pub use actions::{apply_action, apply_actions, AppAction, AppActionDispatcher, AppCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingModel,
    ExecutingSkills,
    TypingSimulation,
}

/// Tool calls of one assistant message, with results buffered until they can
/// be appended in request order.
#[derive(Debug, Clone, Default)]
pub struct PendingSkills {
    pub calls: Vec<ToolCallRequest>,
    pub results: Vec<Option<ExecutionResult>>,
    /// Index of the next call whose `tool` message has not been appended.
    pub next_flush: usize,
}

impl PendingSkills {
    pub fn new(calls: Vec<ToolCallRequest>) -> Self {
        let results = vec![None; calls.len()];
        Self {
            calls,
            results,
            next_flush: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_flush == self.calls.len()
    }

    pub fn outstanding(&self) -> usize {
        self.results.iter().filter(|result| result.is_none()).count()
    }
}

#[derive(Debug, Clone)]
pub struct TurnState {
    /// Identifies the active turn; background results carrying any other id
    /// are dropped.
    pub id: u64,
    pub phase: TurnPhase,
    /// Continuation rounds already dispatched in this turn.
    pub round: u32,
    /// Set once the round cap forced a request without tool definitions.
    pub tools_withheld: bool,
    pub pending: PendingSkills,
}

impl TurnState {
    fn idle(id: u64) -> Self {
        Self {
            id,
            phase: TurnPhase::Idle,
            round: 0,
            tools_withheld: false,
            pending: PendingSkills::default(),
        }
    }
}

/// Progressive reveal of one assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingState {
    pub message_index: usize,
    pub revealed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// App-generated line shown in the transcript. Not part of the session and
/// never sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    /// Number of session messages that existed when the notice was raised;
    /// the renderer places it after them.
    pub after_message: usize,
}

pub struct App {
    pub session: Session,
    pub config: Config,
    pub executor: SkillExecutor,
    pub turn: TurnState,
    pub typing: Option<TypingState>,
    pub notices: Vec<Notice>,
    /// Whether tool definitions go out with the next request.
    pub skills_enabled: bool,
    /// `--no-skills` override; wins over every capability check.
    pub skills_disabled_by_user: bool,
    /// Endpoint to return to when leaving NSFW mode.
    pub safe_endpoint: Option<String>,
    pub last_warning_level: WarningLevel,
    persist_requested: bool,
}

impl App {
    pub fn new(
        config: Config,
        registry: Arc<SkillRegistry>,
        session: Session,
        skills_disabled_by_user: bool,
    ) -> Self {
        let mut app = Self {
            session,
            config,
            executor: SkillExecutor::new(registry),
            turn: TurnState::idle(0),
            typing: None,
            notices: Vec::new(),
            skills_enabled: false,
            skills_disabled_by_user,
            safe_endpoint: None,
            last_warning_level: WarningLevel::Ok,
            persist_requested: false,
        };
        app.close_interrupted_tool_calls();
        app.refresh_skills_enabled();
        app.last_warning_level = app.context_usage().warning_level();
        app
    }

    /// Answers tool calls a previous run exited before finishing, so the
    /// history is a valid request again.
    fn close_interrupted_tool_calls(&mut self) {
        let calls = self.session.unanswered_tool_calls();
        if calls.is_empty() {
            return;
        }

        warn!(session = %self.session.id, calls = calls.len(), "Closing interrupted tool calls");
        let error = SkillError::handler("interrupted: the previous run exited before this skill finished");
        for call in &calls {
            let result = ExecutionResult::failure(&call.function_name, &error);
            self.session
                .push(ConversationMessage::tool_result(call.id.clone(), result.to_tool_content()));
        }
        self.request_persist();
        self.warn(format!(
            "{} skill call(s) from the previous run never finished; they were marked as interrupted.",
            calls.len()
        ));
    }

    /// Replaces the active session with a stored one, abandoning any turn in
    /// flight.
    pub fn resume_session(&mut self, session: Session) -> String {
        self.abandon_turn();
        self.session = session;
        self.safe_endpoint = None;
        self.notices.clear();
        self.close_interrupted_tool_calls();
        self.refresh_skills_enabled();
        self.last_warning_level = self.context_usage().warning_level();
        self.request_persist();
        info!(session = %self.session.id, messages = self.session.messages.len(), "Session resumed");

        if !self.config.is_known_endpoint(&self.session.endpoint) {
            self.warn(format!(
                "Endpoint '{}' from this session is not configured; switch with /endpoint.",
                self.session.endpoint
            ));
        }
        format!(
            "Resumed session {} ({} messages) on {} / {}.",
            self.session.id,
            self.session.messages.len(),
            self.session.endpoint,
            self.session.model
        )
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        self.executor.registry()
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.turn.phase,
            TurnPhase::AwaitingModel | TurnPhase::ExecutingSkills
        )
    }

    pub fn request_persist(&mut self) {
        self.persist_requested = true;
    }

    pub(crate) fn take_persist_request(&mut self) -> bool {
        std::mem::take(&mut self.persist_requested)
    }

    pub fn push_notice(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notices.push(Notice {
            kind,
            text: text.into(),
            after_message: self.session.messages.len(),
        });
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push_notice(NoticeKind::Info, text);
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.push_notice(NoticeKind::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push_notice(NoticeKind::Error, text);
    }

    pub fn context_limit(&self) -> u32 {
        self.config
            .context_limit
            .unwrap_or_else(|| model_context_limit(&self.session.model))
    }

    pub fn context_usage(&self) -> ContextUsage {
        let current = if self.session.usage.last_prompt_tokens > 0 {
            self.session.usage.last_prompt_tokens
        } else {
            estimate_tokens(&self.session.messages)
        };
        ContextUsage::new(current, self.context_limit())
    }

    /// Raises a notice whenever the level changes to anything but `ok`.
    pub(crate) fn update_context_level(&mut self) {
        let usage = self.context_usage();
        let level = usage.warning_level();
        if level == self.last_warning_level {
            return;
        }

        info!(
            from = %self.last_warning_level,
            to = %level,
            tokens = usage.current_tokens,
            limit = usage.max_tokens,
            "Context level changed"
        );
        self.last_warning_level = level;
        let percent = usage.percent();
        match level {
            WarningLevel::Ok => {}
            WarningLevel::Warn => self.warn(format!(
                "Context is {percent:.0}% full ({} of {} tokens).",
                usage.current_tokens, usage.max_tokens
            )),
            WarningLevel::Caution => self.warn(format!(
                "Context is {percent:.0}% full. Consider /clear or /session new soon."
            )),
            WarningLevel::Critical => self.error(format!(
                "Context is {percent:.0}% full. The provider may start rejecting requests; use /clear or /session new."
            )),
        }
    }

    /// Recomputes whether tool definitions accompany requests.
    pub fn refresh_skills_enabled(&mut self) {
        self.skills_enabled = !self.skills_disabled_by_user
            && !self.session.nsfw_mode
            && self
                .config
                .tools_available(&self.session.endpoint, &self.session.model);
    }

    /// Switches endpoint and picks its tool-calling model when it has one.
    pub fn switch_endpoint(&mut self, id: &str) -> Result<String, String> {
        if !self.config.is_known_endpoint(id) {
            return Err(format!(
                "Unknown endpoint '{id}'. Known: {}",
                self.known_endpoints().join(", ")
            ));
        }

        let canonical = find_provider(id)
            .map(|provider| provider.id.to_string())
            .or_else(|| self.config.endpoint_config(id).map(|e| e.id.clone()))
            .unwrap_or_else(|| id.to_string());
        if let Some(model) = self.config.initial_model(&canonical) {
            self.session.model = model;
        }
        self.session.endpoint = canonical;
        self.session.touch();
        self.refresh_skills_enabled();
        self.update_context_level();
        self.request_persist();

        info!(endpoint = %self.session.endpoint, model = %self.session.model, skills = self.skills_enabled, "Endpoint switched");
        Ok(format!(
            "Endpoint: {} · model: {} · skills {}",
            self.session.endpoint,
            self.session.model,
            if self.skills_enabled { "on" } else { "off" }
        ))
    }

    pub fn set_model(&mut self, model: &str) -> String {
        self.session.model = model.to_string();
        self.session.touch();
        self.refresh_skills_enabled();
        self.update_context_level();
        self.request_persist();
        format!(
            "Model: {} · skills {}",
            self.session.model,
            if self.skills_enabled { "on" } else { "off" }
        )
    }

    pub fn enable_nsfw(&mut self) -> Result<String, String> {
        if self.session.nsfw_mode {
            return Ok(format!(
                "Already in NSFW mode on {}.",
                self.session.endpoint
            ));
        }

        let previous = self.session.endpoint.clone();
        let target = self.config.nsfw_endpoint().to_string();
        self.session.nsfw_mode = true;
        match self.switch_endpoint(&target) {
            Ok(summary) => {
                self.safe_endpoint = Some(previous);
                Ok(format!("NSFW mode on. {summary}"))
            }
            Err(err) => {
                self.session.nsfw_mode = false;
                self.refresh_skills_enabled();
                Err(err)
            }
        }
    }

    pub fn restore_safe(&mut self) -> Result<String, String> {
        if !self.session.nsfw_mode {
            return Ok("Already in safe mode.".to_string());
        }

        let saved = self.safe_endpoint.take();
        let target = saved
            .clone()
            .unwrap_or_else(|| self.config.default_endpoint().to_string());
        self.session.nsfw_mode = false;
        match self.switch_endpoint(&target) {
            Ok(summary) => Ok(format!("Safe mode restored. {summary}")),
            Err(err) => {
                self.session.nsfw_mode = true;
                self.safe_endpoint = saved;
                self.refresh_skills_enabled();
                Err(err)
            }
        }
    }

    pub fn known_endpoints(&self) -> Vec<String> {
        let mut ids: Vec<String> = crate::core::providers::builtin_providers()
            .iter()
            .map(|provider| provider.id.to_string())
            .collect();
        for endpoint in &self.config.endpoints {
            if !ids.iter().any(|id| id.eq_ignore_ascii_case(&endpoint.id)) {
                ids.push(endpoint.id.clone());
            }
        }
        ids
    }

    /// Drops the in-flight turn so its late results are ignored.
    pub(crate) fn abandon_turn(&mut self) {
        self.turn = TurnState::idle(self.turn.id + 1);
        self.typing = None;
    }

    pub(crate) fn begin_turn(&mut self) {
        self.turn = TurnState::idle(self.turn.id + 1);
        self.turn.phase = TurnPhase::AwaitingModel;
    }

    pub fn new_session(&mut self) -> String {
        self.abandon_turn();
        let nsfw_mode = self.session.nsfw_mode;
        self.session = Session::new(self.session.endpoint.clone(), self.session.model.clone());
        self.session.nsfw_mode = nsfw_mode;
        self.notices.clear();
        self.last_warning_level = WarningLevel::Ok;
        self.request_persist();
        format!("Started session {}.", self.session.id)
    }

    pub fn clear_history(&mut self) {
        self.abandon_turn();
        self.session.clear_messages();
        self.notices.clear();
        self.last_warning_level = WarningLevel::Ok;
        self.request_persist();
    }

    /// Wire messages for the next request, led by the configured system
    /// prompt.
    pub fn api_messages(&self) -> Vec<ChatMessage> {
        let system = self
            .config
            .system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
            .map(|prompt| ConversationMessage::system(prompt).to_api());
        system
            .into_iter()
            .chain(self.session.messages.iter().map(ConversationMessage::to_api))
            .collect()
    }

    pub fn build_request(&self, allow_tools: bool) -> ProviderRequest {
        let tools = if allow_tools && self.skills_enabled {
            Some(self.registry().to_tool_definitions()).filter(|defs| !defs.is_empty())
        } else {
            None
        };

        ProviderRequest {
            endpoint: self.config.resolve_endpoint(&self.session.endpoint),
            model: self.session.model.clone(),
            messages: self.api_messages(),
            tools,
        }
    }

    /// Content of message `index` as currently displayed; a message being
    /// typed shows only its revealed prefix.
    pub fn visible_content(&self, index: usize) -> &str {
        let Some(message) = self.session.messages.get(index) else {
            return "";
        };
        match &self.typing {
            Some(typing) if typing.message_index == index => {
                let end = message
                    .content
                    .grapheme_indices(true)
                    .nth(typing.revealed)
                    .map_or(message.content.len(), |(offset, _)| offset);
                &message.content[..end]
            }
            _ => &message.content,
        }
    }

    /// One-line description of what the turn is waiting on.
    pub fn activity(&self) -> Option<String> {
        match self.turn.phase {
            TurnPhase::Idle => None,
            TurnPhase::AwaitingModel => Some(format!("Waiting for {}…", self.session.model)),
            TurnPhase::ExecutingSkills => {
                let outstanding = self.turn.pending.outstanding();
                Some(format!(
                    "Running {outstanding} skill{}…",
                    if outstanding == 1 { "" } else { "s" }
                ))
            }
            TurnPhase::TypingSimulation => Some("Typing…".to_string()),
        }
    }
}
