//! Task-creation wizard state machine
//!
//! Elm-style: a pure `transition` maps (state, event) to a new state plus
//! effects; the runtime executes the effects.

pub mod effect;
pub mod event;
pub mod state;
pub mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Prompt};
pub use event::{Direction, Event};
pub use state::{ChatContext, ConversationState, WizardStep};
pub use transition::{transition, TransitionError};
