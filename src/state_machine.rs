//! Per-user conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

pub(crate) mod commands;
pub mod copy;
mod effect;
mod event;
pub(crate) mod transition;
pub(crate) mod tutorial;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Outbound};
pub use event::Event;
pub use transition::{transition, BotContext, Pacing, TransitionError, TransitionResult};
