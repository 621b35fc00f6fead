//! Parley is a terminal chat client that lets remote language models call
//! local skills in the middle of a conversation.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`skills`] holds the skill registry, the executor that validates and
//!   runs tool calls, and the built-in skills.
//! - [`core`] owns the conversation state machine, sessions, configuration,
//!   the provider table, and the HTTP provider client.
//! - [`ui`] renders the terminal interface and runs the event loop that turns
//!   app commands into background tasks.
//! - [`commands`] implements the local slash commands.
//! - [`api`] defines the `chat/completions` wire payloads.
//!
//! The binary (`src/main.rs`) routes through [`cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod skills;
pub mod ui;
pub mod utils;
