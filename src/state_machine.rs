//! Core slot-filling state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! transition function owns the pending queue and the confirmed map, while
//! parsers, reactions and deliveries run as effects in the runtime.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::{Directive, Event};
pub use state::{Conversation, ConvState, Parsed, PendingQueue, SkillOutline, StalledStep};
pub use transition::{transition, ProtocolDefect, TransitionError, TransitionResult};
