//! Parley - slot-filling conversation engine
//!
//! Collects a skill's parameters turn by turn, validates answers with
//! NLU-backed parsers, and runs the skill's finish routine once everything
//! is confirmed.

pub mod config;
pub mod db;
pub mod message;
pub mod nlu;
pub mod runtime;
pub mod skill;
pub mod state_machine;
