//! Terminal UI: the interactive loop in [`chat_loop`] and frame drawing in
//! [`renderer`]. Domain state and decisions live in [`crate::core`].

pub mod chat_loop;
pub mod renderer;
