//! Skills are named, schema-described functions the model may call
//! mid-conversation.
//!
//! [`registry::SkillRegistry`] holds definitions and handler bindings,
//! [`executor::SkillExecutor`] resolves a tool call against it and normalizes
//! every outcome into an [`executor::ExecutionResult`], and [`builtin`]
//! registers the skills that ship with the binary.

pub mod builtin;
pub mod executor;
pub mod registry;

use std::fmt;

pub use executor::{ExecutionResult, SkillExecutor};
pub use registry::{SkillArgs, SkillDefinition, SkillHandler, SkillRegistry};

/// Failures that originate inside skill resolution or execution. All of them
/// are recoverable: they are rendered into a `tool` message for the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillError {
    /// Arguments were missing, malformed, or violated the parameter schema.
    Validation(String),
    /// No definition is registered under the requested name.
    NotFound(String),
    /// A definition exists but nothing is bound to run it.
    NoHandler(String),
    /// The handler ran and reported a failure.
    Handler(String),
}

impl SkillError {
    pub fn kind(&self) -> &'static str {
        match self {
            SkillError::Validation(_) => "validation",
            SkillError::NotFound(_) => "not_found",
            SkillError::NoHandler(_) => "no_handler",
            SkillError::Handler(_) => "handler",
        }
    }

    pub fn handler(message: impl Into<String>) -> Self {
        SkillError::Handler(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SkillError::Validation(message.into())
    }
}

impl fmt::Display for SkillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkillError::Validation(message) => write!(f, "{message}"),
            SkillError::NotFound(name) => write!(f, "skill not found: {name}"),
            SkillError::NoHandler(name) => write!(f, "no handler for skill: {name}"),
            SkillError::Handler(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for SkillError {}
