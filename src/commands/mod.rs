//! Local commands. Nothing handled here is ever sent to the model.

mod registry;

pub use registry::{all_commands, find_command, CommandInvocation};

use crate::core::app::App;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    ProcessAsMessage(String),
    /// Read the session store and report what it holds.
    ListSessions,
    /// Load a stored session by id and make it the active one.
    ResumeSession(String),
    Quit,
}

pub fn process_input(app: &mut App, input: &str) -> CommandResult {
    let trimmed = input.trim();

    if matches!(trimmed.to_ascii_lowercase().as_str(), "exit" | "quit" | "q") {
        return CommandResult::Quit;
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(trimmed.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command_name = parts.next().unwrap_or_default();
    let args = parts.next().unwrap_or("").trim();

    match find_command(command_name) {
        Some(command) => (command.handler)(app, CommandInvocation { args }),
        None => {
            app.warn(format!(
                "Unknown command: /{command_name}. Type /help for the list."
            ));
            CommandResult::Continue
        }
    }
}

pub(super) fn handle_help(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let width = all_commands()
        .iter()
        .map(|command| command.usage.len())
        .max()
        .unwrap_or(0);
    let mut help = String::from("Commands:");
    for command in all_commands() {
        help.push_str(&format!("\n  {:<width$}  {}", command.usage, command.help));
    }
    app.info(help);
    CommandResult::Continue
}

pub(super) fn handle_clear(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    app.clear_history();
    app.info("Conversation cleared.");
    CommandResult::Continue
}

pub(super) fn handle_endpoint(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        let listing = app
            .known_endpoints()
            .into_iter()
            .map(|id| {
                let marker = if id == app.session.endpoint { "*" } else { " " };
                let tools = if app.config.endpoint_supports_tools(&id) {
                    "skills"
                } else {
                    "no skills"
                };
                format!("\n {marker} {id} ({tools})")
            })
            .collect::<String>();
        app.info(format!("Endpoints:{listing}"));
        return CommandResult::Continue;
    }

    if app.session.nsfw_mode {
        app.warn("Leave NSFW mode with /safe before switching endpoints.");
        return CommandResult::Continue;
    }

    match app.switch_endpoint(invocation.args) {
        Ok(message) => app.info(message),
        Err(message) => app.error(message),
    }
    CommandResult::Continue
}

pub(super) fn handle_model(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        let message = format!(
            "Model: {} on {} · skills {}",
            app.session.model,
            app.session.endpoint,
            if app.skills_enabled { "on" } else { "off" }
        );
        app.info(message);
        return CommandResult::Continue;
    }

    let message = app.set_model(invocation.args);
    app.info(message);
    if !app.skills_enabled && !app.session.nsfw_mode && !app.skills_disabled_by_user {
        app.warn(format!(
            "{} is not known to support tool calling; skills are off.",
            app.session.model
        ));
    }
    CommandResult::Continue
}

pub(super) fn handle_nsfw(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    match app.enable_nsfw() {
        Ok(message) => app.info(message),
        Err(message) => app.error(message),
    }
    CommandResult::Continue
}

pub(super) fn handle_safe(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    match app.restore_safe() {
        Ok(message) => app.info(message),
        Err(message) => app.error(message),
    }
    CommandResult::Continue
}

pub(super) fn handle_skills(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let skills = app.registry().list_skills();
    if skills.is_empty() {
        app.info("No skills registered.");
        return CommandResult::Continue;
    }

    let state = if app.skills_enabled {
        "sent with each request"
    } else if app.skills_disabled_by_user {
        "disabled by --no-skills"
    } else if app.session.nsfw_mode {
        "disabled in NSFW mode"
    } else {
        "not supported by the current endpoint/model"
    };
    let mut listing = format!("Skills ({}, {state}):", skills.len());
    for skill in skills {
        let handler = if app.registry().has_handler(&skill.name) {
            ""
        } else {
            " [no handler]"
        };
        listing.push_str(&format!("\n  {}{handler}: {}", skill.name, skill.description));
    }
    app.info(listing);
    CommandResult::Continue
}

pub(super) fn handle_context(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let usage = app.context_usage();
    let counters = app.session.usage;
    let source = if counters.estimated || counters.total_tokens == 0 {
        " (estimated)"
    } else {
        ""
    };
    app.info(format!(
        "Context: {} / {} tokens ({:.1}%, {}){source}\nSession totals: {} prompt · {} completion · {} total",
        usage.current_tokens,
        usage.max_tokens,
        usage.percent(),
        usage.warning_level(),
        counters.prompt_tokens,
        counters.completion_tokens,
        counters.total_tokens,
    ));
    CommandResult::Continue
}

pub(super) fn handle_session(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let mut parts = invocation.args.split_whitespace();
    let option = parts.next().unwrap_or("info").to_ascii_lowercase();

    match option.as_str() {
        "new" => {
            let message = app.new_session();
            app.info(message);
        }
        "info" => {
            let session = &app.session;
            let message = format!(
                "Session {} · {} messages · {} / {}{} · started {}",
                session.id,
                session.messages.len(),
                session.endpoint,
                session.model,
                if session.nsfw_mode { " · nsfw" } else { "" },
                session.created_at.format("%Y-%m-%d %H:%M UTC"),
            );
            app.info(message);
        }
        "list" => return CommandResult::ListSessions,
        "resume" => match parts.next() {
            None => app.warn("Usage: /session resume <id>. See /session list for ids."),
            Some(id) if id == app.session.id => {
                app.info(format!("Session {id} is already active."));
            }
            Some(id) => return CommandResult::ResumeSession(id.to_string()),
        },
        other => app.warn(format!(
            "Unknown /session option '{other}'. Use new, info, list or resume <id>."
        )),
    }
    CommandResult::Continue
}

pub(super) fn handle_quit(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
