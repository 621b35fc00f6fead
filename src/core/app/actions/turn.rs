use tracing::{debug, info, warn};
use unicode_segmentation::UnicodeSegmentation;

use super::{typing, AppCommand};
use crate::commands::{self, CommandResult};
use crate::core::app::{App, PendingSkills, TurnPhase, TypingState};
use crate::core::context::{estimate_text_tokens, estimate_tokens};
use crate::core::message::ConversationMessage;
use crate::core::provider_client::{ProviderError, ProviderResponse, TokenUsage};
use crate::skills::ExecutionResult;

pub(super) fn handle_submit(app: &mut App, text: String) -> Vec<AppCommand> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if app.turn.phase == TurnPhase::TypingSimulation {
        typing::fast_forward(app);
    }

    match commands::process_input(app, trimmed) {
        CommandResult::Continue => Vec::new(),
        CommandResult::Quit => vec![AppCommand::Quit],
        CommandResult::ListSessions => vec![AppCommand::ListSessions],
        CommandResult::ResumeSession(id) => vec![AppCommand::LoadSession { id }],
        CommandResult::ProcessAsMessage(message) => send_user_message(app, message),
    }
}

fn send_user_message(app: &mut App, message: String) -> Vec<AppCommand> {
    if app.is_busy() {
        app.warn("Still working on the previous message. Wait for the reply before sending another.");
        return Vec::new();
    }

    app.begin_turn();
    app.session.push(ConversationMessage::user(message));
    app.request_persist();
    vec![dispatch_request(app, true)]
}

fn dispatch_request(app: &mut App, allow_tools: bool) -> AppCommand {
    app.turn.phase = TurnPhase::AwaitingModel;
    let request = app.build_request(allow_tools);
    debug!(
        turn = app.turn.id,
        round = app.turn.round,
        messages = request.messages.len(),
        tools = request.tools.as_ref().map_or(0, Vec::len),
        "Requesting model response"
    );
    AppCommand::SendToProvider {
        turn_id: app.turn.id,
        request,
    }
}

pub(super) fn handle_provider_response(
    app: &mut App,
    turn_id: u64,
    result: Result<ProviderResponse, ProviderError>,
) -> Vec<AppCommand> {
    if turn_id != app.turn.id || app.turn.phase != TurnPhase::AwaitingModel {
        debug!(turn_id, current = app.turn.id, "Discarding stale provider response");
        return Vec::new();
    }

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            warn!(turn = turn_id, error = %err, "Provider request failed");
            app.error(err.to_string());
            app.turn.phase = TurnPhase::Idle;
            return Vec::new();
        }
    };

    record_usage(app, &response);

    if !response.tool_calls.is_empty() {
        if app.turn.tools_withheld {
            return finish_after_withheld_tools(app, response);
        }
        return start_skills(app, response);
    }

    finish_with_text(app, response.content)
}

/// Provider-reported usage wins; otherwise estimate from the history.
fn record_usage(app: &mut App, response: &ProviderResponse) {
    let (usage, estimated) = match response.usage {
        Some(usage) => (usage, false),
        None => {
            let prompt_tokens = estimate_tokens(&app.session.messages).saturating_add(
                app.config
                    .system_prompt
                    .as_deref()
                    .map_or(0, estimate_text_tokens),
            );
            let completion_tokens = response
                .tool_calls
                .iter()
                .fold(estimate_text_tokens(&response.content), |total, call| {
                    total.saturating_add(estimate_text_tokens(&call.arguments_raw))
                });
            (
                TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens.saturating_add(completion_tokens),
                },
                true,
            )
        }
    };
    app.session.usage.record(usage, estimated);
    app.update_context_level();
}

fn start_skills(app: &mut App, response: ProviderResponse) -> Vec<AppCommand> {
    let ProviderResponse {
        content,
        tool_calls,
        ..
    } = response;

    info!(
        turn = app.turn.id,
        calls = tool_calls.len(),
        names = %tool_calls.iter().map(|c| c.function_name.as_str()).collect::<Vec<_>>().join(","),
        "Model requested skills"
    );

    app.session.push(ConversationMessage::assistant_with_tool_calls(
        content,
        tool_calls.clone(),
    ));
    app.request_persist();
    app.turn.phase = TurnPhase::ExecutingSkills;
    app.turn.pending = PendingSkills::new(tool_calls.clone());

    let turn_id = app.turn.id;
    tool_calls
        .into_iter()
        .enumerate()
        .map(|(index, call)| AppCommand::ExecuteSkill {
            turn_id,
            index,
            call,
        })
        .collect()
}

/// The model asked for skills after the round cap withheld them. Keep any
/// text it sent and end the turn; answering the calls would reopen the loop.
fn finish_after_withheld_tools(app: &mut App, response: ProviderResponse) -> Vec<AppCommand> {
    warn!(
        turn = app.turn.id,
        calls = response.tool_calls.len(),
        "Ignoring tool calls requested after the round limit"
    );
    if response.content.trim().is_empty() {
        app.warn("The model kept requesting skills after the round limit; the turn was ended.");
        app.turn.phase = TurnPhase::Idle;
        return Vec::new();
    }
    finish_with_text(app, response.content)
}

fn finish_with_text(app: &mut App, content: String) -> Vec<AppCommand> {
    // An empty assistant entry would be replayed on every later request.
    if content.trim().is_empty() {
        app.info("The model returned an empty response.");
        app.turn.phase = TurnPhase::Idle;
        return Vec::new();
    }

    let total = content.graphemes(true).count();
    app.session.push(ConversationMessage::assistant(content));
    app.request_persist();

    app.turn.phase = TurnPhase::TypingSimulation;
    app.typing = Some(TypingState {
        message_index: app.session.messages.len() - 1,
        revealed: 0,
        total,
    });
    vec![AppCommand::ScheduleTypingTick {
        turn_id: app.turn.id,
        delay: app.config.tick_interval(),
    }]
}

pub(super) fn handle_skill_completed(
    app: &mut App,
    turn_id: u64,
    index: usize,
    result: ExecutionResult,
) -> Vec<AppCommand> {
    if turn_id != app.turn.id || app.turn.phase != TurnPhase::ExecutingSkills {
        debug!(turn_id, current = app.turn.id, index, "Discarding stale skill result");
        return Vec::new();
    }

    let Some(slot) = app.turn.pending.results.get_mut(index) else {
        warn!(turn_id, index, "Skill result for unknown call index");
        return Vec::new();
    };
    if slot.is_some() {
        debug!(turn_id, index, "Ignoring duplicate skill result");
        return Vec::new();
    }
    *slot = Some(result);

    flush_ready_results(app);
    if !app.turn.pending.is_complete() {
        return Vec::new();
    }

    app.turn.round += 1;
    let allow_tools = app.turn.round < app.config.max_tool_rounds();
    if !allow_tools {
        app.turn.tools_withheld = true;
        let limit = app.config.max_tool_rounds();
        warn!(turn = turn_id, limit, "Tool round limit reached");
        app.warn(format!(
            "Reached the limit of {limit} skill rounds for this message; asking the model to answer without skills."
        ));
    }
    vec![dispatch_request(app, allow_tools)]
}

/// Appends `tool` messages for the contiguous run of finished calls,
/// starting at the first one not yet appended.
fn flush_ready_results(app: &mut App) {
    let pending = &mut app.turn.pending;
    let mut flushed = Vec::new();
    while pending.next_flush < pending.calls.len() {
        let Some(result) = pending.results[pending.next_flush].as_ref() else {
            break;
        };
        let call = &pending.calls[pending.next_flush];
        flushed.push(ConversationMessage::tool_result(
            call.id.clone(),
            result.to_tool_content(),
        ));
        pending.next_flush += 1;
    }

    if flushed.is_empty() {
        return;
    }
    for message in flushed {
        app.session.push(message);
    }
    app.request_persist();
}
