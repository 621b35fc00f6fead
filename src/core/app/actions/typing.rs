use tracing::debug;

use super::AppCommand;
use crate::core::app::{App, TurnPhase};

pub(super) fn handle_tick(app: &mut App, turn_id: u64) -> Vec<AppCommand> {
    if turn_id != app.turn.id || app.turn.phase != TurnPhase::TypingSimulation {
        debug!(turn_id, current = app.turn.id, "Discarding stale typing tick");
        return Vec::new();
    }

    let step = app.config.chars_per_tick();
    let done = match app.typing.as_mut() {
        Some(typing) => {
            typing.revealed = (typing.revealed + step).min(typing.total);
            typing.revealed >= typing.total
        }
        None => true,
    };
    if done {
        fast_forward(app);
        return Vec::new();
    }

    vec![AppCommand::ScheduleTypingTick {
        turn_id,
        delay: app.config.tick_interval(),
    }]
}

/// Ends the reveal, showing the full message.
pub(super) fn fast_forward(app: &mut App) {
    app.typing = None;
    app.turn.phase = TurnPhase::Idle;
}
