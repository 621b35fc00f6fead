mod sessions;
mod turn;
mod typing;

use std::time::Duration;

use tokio::sync::mpsc;

use super::App;
use crate::core::message::ToolCallRequest;
use crate::core::provider_client::{ProviderError, ProviderRequest, ProviderResponse};
use crate::core::session::{PersistenceError, Session, SessionSummary};
use crate::skills::ExecutionResult;

/// Events applied to the [`App`], one at a time, by the chat loop.
#[derive(Debug)]
pub enum AppAction {
    SubmitInput {
        text: String,
    },
    ProviderResponded {
        turn_id: u64,
        result: Result<ProviderResponse, ProviderError>,
    },
    SkillCompleted {
        turn_id: u64,
        index: usize,
        result: ExecutionResult,
    },
    TypingTick {
        turn_id: u64,
    },
    SessionsListed {
        result: Result<Vec<SessionSummary>, PersistenceError>,
    },
    SessionLoaded {
        id: String,
        result: Result<Box<Session>, PersistenceError>,
    },
}

#[derive(Clone)]
pub struct AppActionDispatcher {
    tx: mpsc::UnboundedSender<AppAction>,
}

impl AppActionDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<AppAction>) -> Self {
        Self { tx }
    }

    /// Send failures mean the loop has shut down; the action is moot then.
    pub fn dispatch(&self, action: AppAction) {
        let _ = self.tx.send(action);
    }

    pub fn dispatch_many<I>(&self, actions: I)
    where
        I: IntoIterator<Item = AppAction>,
    {
        for action in actions {
            self.dispatch(action);
        }
    }
}

/// Side effects requested by the state machine.
#[derive(Debug)]
pub enum AppCommand {
    SendToProvider {
        turn_id: u64,
        request: ProviderRequest,
    },
    ExecuteSkill {
        turn_id: u64,
        index: usize,
        call: ToolCallRequest,
    },
    ScheduleTypingTick {
        turn_id: u64,
        delay: Duration,
    },
    PersistSession(Box<Session>),
    ListSessions,
    LoadSession {
        id: String,
    },
    Quit,
}

pub fn apply_actions(app: &mut App, actions: impl IntoIterator<Item = AppAction>) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    for action in actions {
        commands.extend(apply_action(app, action));
    }
    commands
}

/// Applies one action. At most one `PersistSession` is emitted per call, with
/// a snapshot taken after every mutation the action caused.
pub fn apply_action(app: &mut App, action: AppAction) -> Vec<AppCommand> {
    let mut commands = match action {
        AppAction::SubmitInput { text } => turn::handle_submit(app, text),
        AppAction::ProviderResponded { turn_id, result } => {
            turn::handle_provider_response(app, turn_id, result)
        }
        AppAction::SkillCompleted {
            turn_id,
            index,
            result,
        } => turn::handle_skill_completed(app, turn_id, index, result),
        AppAction::TypingTick { turn_id } => typing::handle_tick(app, turn_id),
        AppAction::SessionsListed { result } => sessions::handle_listed(app, result),
        AppAction::SessionLoaded { id, result } => sessions::handle_loaded(app, &id, result),
    };

    if app.take_persist_request() {
        commands.push(AppCommand::PersistSession(Box::new(app.session.clone())));
    }
    commands
}
