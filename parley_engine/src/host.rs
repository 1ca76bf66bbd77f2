//! Host services consumed by the dialogue engine.
//!
//! The engine owns no game state besides its rules. Flags, inventories, quests,
//! character levels, map connections, the clock and speech output all belong to the
//! hosting game and are reached through the traits below. [`GameHost`] bundles them,
//! and is implemented automatically for anything implementing all seven.

pub mod memory;

pub use memory::MemoryHost;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::GameTime;
use crate::idgen::{NAMESPACE_ACTOR, new_id, uuid_from_name};

/// A conversation participant as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
}
impl Entity {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }

    /// Participant with a stable id derived from its name.
    pub fn named(name: &str) -> Self {
        Self::new(uuid_from_name(&NAMESPACE_ACTOR, name), name)
    }

    /// Participant created at runtime, with a fresh random id.
    pub fn spawned(name: &str) -> Self {
        Self::new(new_id(), name)
    }
}

/// Keyed string persistence attached to an entity's save data.
pub trait FlagBackend {
    fn read_key(&self, owner: &Entity, key: &str) -> Option<String>;
    fn write_key(&mut self, owner: &Entity, key: &str, value: &str, persist: bool);
}

/// Item holdings. Currency is special-cased: it is summed across denominations.
pub trait Inventory {
    fn count_item(&self, holder: &Entity, item: &str) -> u64;
    fn currency_total(&self, holder: &Entity) -> u64;
    /// # Errors
    /// - if the item is unknown to the host
    fn create_item(&mut self, holder: &Entity, item: &str, quantity: u64) -> Result<()>;
    /// # Errors
    /// - if the holder does not have `quantity` of the item
    fn destroy_item(&mut self, holder: &Entity, item: &str, quantity: u64) -> Result<()>;
    /// # Errors
    /// - if `from` does not have `quantity` of the item
    fn transfer_item(&mut self, from: &Entity, to: &Entity, item: &str, quantity: u64) -> Result<()>;
    /// Take `amount` from the holder's purse. A failed withdrawal leaves the purse as it was.
    ///
    /// # Errors
    /// - if the holder cannot afford `amount`
    /// - if the change cannot be paid back in the host's denominations
    fn withdraw_currency(&mut self, holder: &Entity, amount: u64) -> Result<()>;
    /// Mint `amount` into the holder's purse, all of it or none.
    ///
    /// # Errors
    /// - if `amount` cannot be expressed in the host's denominations
    fn deposit_currency(&mut self, holder: &Entity, amount: u64) -> Result<()>;
}

/// Per-actor quest progression.
pub trait QuestLog {
    fn quest_stage(&self, actor: &Entity, quest: &str) -> Option<u32>;
    /// # Errors
    /// - if the quest is unknown to the host
    fn start_quest(&mut self, actor: &Entity, quest: &str, stage: u32) -> Result<()>;
    /// # Errors
    /// - if the quest is unknown to the host
    fn set_quest_stage(&mut self, actor: &Entity, quest: &str, stage: u32) -> Result<()>;
}

/// Numeric character levels: overall (`skill == None`) or per skill.
pub trait Attributes {
    fn level(&self, actor: &Entity, skill: Option<&str>) -> Option<u32>;
}

/// Map connection signalling (gates, doors, teleporters wired to an id).
pub trait MapLinks {
    /// # Errors
    /// - if nothing on the map is wired to `id`
    fn trigger_connection(&mut self, id: i64, state: bool, source: &Entity) -> Result<()>;
}

/// Source of the current in-game time.
pub trait GameClock {
    fn now(&self) -> GameTime;
}

/// Delivery of spoken lines to the listener.
pub trait Speech {
    fn say(&mut self, speaker: &Entity, listener: &Entity, text: &str);
}

/// Every service the dialogue engine needs from its host.
pub trait GameHost: FlagBackend + Inventory + QuestLog + Attributes + MapLinks + GameClock + Speech {}
impl<T> GameHost for T where T: FlagBackend + Inventory + QuestLog + Attributes + MapLinks + GameClock + Speech {}
