use tracing::{info, warn};

use crate::core::app::{AppAction, AppActionDispatcher};
use crate::core::message::ToolCallRequest;
use crate::skills::{ExecutionResult, SkillError, SkillExecutor};

/// Handlers are synchronous and may block on I/O, so they run on the
/// blocking pool.
pub fn spawn_skill_execution(
    dispatcher: AppActionDispatcher,
    executor: SkillExecutor,
    turn_id: u64,
    index: usize,
    call: ToolCallRequest,
) {
    tokio::spawn(async move {
        let name = call.function_name.clone();
        let id = call.id.clone();
        info!(turn_id, tool = %name, %id, "Tool call started");

        let result =
            match tokio::task::spawn_blocking(move || executor.execute_tool_call(&call)).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(turn_id, tool = %name, %id, error = %err, "Skill task aborted");
                    ExecutionResult::failure(
                        &name,
                        &SkillError::handler(format!("skill '{name}' stopped unexpectedly")),
                    )
                }
            };

        info!(turn_id, tool = %name, %id, success = result.success, "Tool call finished");
        dispatcher.dispatch(AppAction::SkillCompleted {
            turn_id,
            index,
            result,
        });
    });
}
