//! The interactive loop: terminal events and background completions are
//! turned into [`AppAction`](crate::core::app::AppAction)s, and the commands
//! the app hands back are executed as tasks.

mod event_loop;
pub mod executors;
pub mod lifecycle;

#[cfg(test)]
mod event_loop_tests;

pub use event_loop::{handle_key, run_chat, KeyOutcome};
pub use executors::{ExecutorContext, LoopControl, SessionWorker};
