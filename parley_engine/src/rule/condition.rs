//! condition.rs -- typed rule preconditions
//!
//! Every precondition is a read-only check against the conversation's flag snapshot
//! or the host's state. None of them may change anything.

use std::fmt::Display;

use log::debug;

use crate::calendar::{GameSpan, GameTime};
use crate::config::EngineConfig;
use crate::dialog::Conversation;
use crate::flags::{FlagSnapshot, WILDCARD};
use crate::host::{Attributes, GameClock, GameHost, Inventory, QuestLog};
use parley_data::tags;

/// Everything a precondition may look at.
pub struct EvalContext<'a> {
    pub host: &'a dyn GameHost,
    pub conversation: &'a Conversation,
    pub flags: &'a FlagSnapshot,
    pub config: &'a EngineConfig,
}

/// A check that must pass before a rule may fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The flag's current value is one of `values` (or `values` contains `*`).
    Flag { name: String, values: Vec<String> },
    /// The actor holds at least `count` of `item`.
    Item { item: String, count: u64 },
    /// The actor's stage in `quest` is at least `stage`.
    Quest { quest: String, stage: u32 },
    /// The actor's overall or per-skill level is at least `level`.
    Level { skill: Option<String>, level: u32 },
    /// At least `span` has passed since the timestamp stored in `flag`.
    Age { flag: String, span: GameSpan },
}

impl Precondition {
    pub fn flag<S: AsRef<str>>(name: &str, values: &[S]) -> Self {
        Self::Flag {
            name: name.to_string(),
            values: values.iter().map(|v| v.as_ref().to_string()).collect(),
        }
    }

    pub fn is_satisfied(&self, ctx: &EvalContext<'_>) -> bool {
        let actor = &ctx.conversation.actor;
        match self {
            Self::Flag { name, values } => {
                let current = ctx.flags.get(name);
                values.iter().any(|v| v == WILDCARD || v == current)
            },
            Self::Item { item, count } => {
                let held = if *item == ctx.config.currency_item {
                    ctx.host.currency_total(actor)
                } else {
                    ctx.host.count_item(actor, item)
                };
                held >= *count
            },
            Self::Quest { quest, stage } => ctx.host.quest_stage(actor, quest).is_some_and(|s| s >= *stage),
            Self::Level { skill, level } => ctx
                .host
                .level(actor, skill.as_deref())
                .is_some_and(|l| l >= *level),
            Self::Age { flag, span } => {
                let stamp = ctx.flags.get(flag);
                match stamp.parse::<GameTime>() {
                    Ok(then) => ctx.config.calendar.has_elapsed(&then, &ctx.host.now(), span),
                    Err(e) => {
                        debug!("age check on '{flag}' fails: no usable timestamp ({e:#})");
                        false
                    },
                }
            },
        }
    }

    /// Canonical document form of this precondition.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Flag { name, values } => {
                // flag names that collide with a tag need the explicit form
                let mut args = if tags::is_precondition_tag(name) {
                    vec![tags::TOKEN.to_string(), name.clone()]
                } else {
                    vec![name.clone()]
                };
                args.extend(values.iter().cloned());
                args
            },
            Self::Item { item, count } => vec![tags::ITEM.into(), item.clone(), count.to_string()],
            Self::Quest { quest, stage } => vec![tags::QUEST.into(), quest.clone(), stage.to_string()],
            Self::Level { skill, level } => {
                let mut args = vec![tags::LEVEL.to_string()];
                args.extend(skill.iter().cloned());
                args.push(level.to_string());
                args
            },
            Self::Age { flag, span } => {
                let mut args = vec![tags::AGE.to_string(), flag.clone()];
                args.extend(span.to_fields().iter().map(u32::to_string));
                args
            },
        }
    }
}

impl Display for Precondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.to_args().join(", "))
    }
}
