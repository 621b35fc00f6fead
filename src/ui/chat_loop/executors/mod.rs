use std::sync::Arc;
use std::time::Duration;

use crate::core::app::{AppAction, AppActionDispatcher, AppCommand};
use crate::core::provider_client::ProviderClient;
use crate::skills::SkillExecutor;

mod persistence;
mod provider;
mod skills;

pub use persistence::SessionWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// Everything a background task needs to do its work and report back.
#[derive(Clone)]
pub struct ExecutorContext {
    pub dispatcher: AppActionDispatcher,
    pub client: Arc<dyn ProviderClient>,
    pub skills: SkillExecutor,
    pub sessions: SessionWorker,
}

impl ExecutorContext {
    pub fn new(
        dispatcher: AppActionDispatcher,
        client: Arc<dyn ProviderClient>,
        skills: SkillExecutor,
        sessions: SessionWorker,
    ) -> Self {
        Self {
            dispatcher,
            client,
            skills,
            sessions,
        }
    }

    /// Starts a task per command. Every command runs even when one of them
    /// asks to quit, so the final session snapshot is still queued.
    pub fn run_commands(&self, commands: Vec<AppCommand>) -> LoopControl {
        let mut control = LoopControl::Continue;
        for command in commands {
            match command {
                AppCommand::SendToProvider { turn_id, request } => {
                    provider::spawn_provider_request(
                        self.dispatcher.clone(),
                        self.client.clone(),
                        turn_id,
                        request,
                    );
                }
                AppCommand::ExecuteSkill {
                    turn_id,
                    index,
                    call,
                } => {
                    skills::spawn_skill_execution(
                        self.dispatcher.clone(),
                        self.skills.clone(),
                        turn_id,
                        index,
                        call,
                    );
                }
                AppCommand::ScheduleTypingTick { turn_id, delay } => {
                    spawn_typing_tick(self.dispatcher.clone(), turn_id, delay);
                }
                AppCommand::PersistSession(session) => self.sessions.save(*session),
                AppCommand::ListSessions => self.sessions.list(),
                AppCommand::LoadSession { id } => self.sessions.load(id),
                AppCommand::Quit => control = LoopControl::Quit,
            }
        }
        control
    }
}

fn spawn_typing_tick(dispatcher: AppActionDispatcher, turn_id: u64, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        dispatcher.dispatch(AppAction::TypingTick { turn_id });
    });
}
