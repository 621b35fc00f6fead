use super::CommandResult;
use crate::core::app::App;

pub type CommandHandler = fn(&mut App, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    /// Everything after the command name, trimmed.
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "clear",
        usage: "/clear",
        help: "Clear the conversation history, keeping the session.",
        handler: super::handle_clear,
    },
    Command {
        name: "endpoint",
        usage: "/endpoint [id]",
        help: "Show endpoints or switch to one.",
        handler: super::handle_endpoint,
    },
    Command {
        name: "model",
        usage: "/model [name]",
        help: "Show or change the model for the current endpoint.",
        handler: super::handle_model,
    },
    Command {
        name: "nsfw",
        usage: "/nsfw",
        help: "Switch to the NSFW endpoint; skills are disabled there.",
        handler: super::handle_nsfw,
    },
    Command {
        name: "safe",
        usage: "/safe",
        help: "Leave NSFW mode and return to the previous endpoint.",
        handler: super::handle_safe,
    },
    Command {
        name: "skills",
        usage: "/skills",
        help: "List registered skills and whether they are sent to the model.",
        handler: super::handle_skills,
    },
    Command {
        name: "context",
        usage: "/context",
        help: "Report token usage against the model's context window.",
        handler: super::handle_context,
    },
    Command {
        name: "session",
        usage: "/session [new|info|list|resume <id>]",
        help: "Start, describe, list or resume sessions.",
        handler: super::handle_session,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Exit (also: exit, quit, q).",
        handler: super::handle_quit,
    },
];
