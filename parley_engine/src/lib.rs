#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub const PARLEY_VERSION: &str = env!("CARGO_PKG_VERSION");

// Core modules
pub mod calendar;
pub mod config;
pub mod dialog;
pub mod error;
pub mod flags;
pub mod host;
pub mod idgen;
pub mod loader;
pub mod rule;

// Re-exports for convenience
pub use calendar::{Calendar, GameSpan, GameTime};
pub use config::{EngineConfig, load_config};
pub use dialog::{Conversation, Dialog, MatchMode, MatchResult};
pub use error::DialogError;
pub use flags::{FlagName, FlagSnapshot, FlagStore};
pub use host::{Entity, GameHost, MemoryHost};
pub use loader::{RuleSet, load_rule_set_file, load_rule_set_str, load_rule_set_value};
pub use rule::{Effect, EffectRegistry, Precondition, Rule};
