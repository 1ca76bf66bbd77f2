//! In-memory host.
//!
//! A complete, self-contained implementation of every host service. Useful as a
//! sandbox for authoring rule sets and as the fixture for the engine's own tests.

use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};
use log::info;
use uuid::Uuid;

use super::{Attributes, Entity, FlagBackend, GameClock, Inventory, MapLinks, QuestLog, Speech};
use crate::calendar::GameTime;

/// A line delivered through [`Speech::say`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenLine {
    pub speaker: Uuid,
    pub listener: Uuid,
    pub text: String,
}

/// A connection fired through [`MapLinks::trigger_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredConnection {
    pub id: i64,
    pub state: bool,
    pub source: Uuid,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    keys: HashMap<(Uuid, String), String>,
    /// Keys whose last write asked for immediate persistence.
    pub persisted: HashSet<(Uuid, String)>,
    /// Item names the host knows how to create; empty means "anything goes".
    pub catalog: HashSet<String>,
    holdings: HashMap<(Uuid, String), u64>,
    /// Currency denominations as `(item name, value)`, highest value first.
    denominations: Vec<(String, u64)>,
    /// Quests that may be started; empty means "anything goes".
    pub known_quests: HashSet<String>,
    quests: HashMap<(Uuid, String), u32>,
    levels: HashMap<(Uuid, Option<String>), u32>,
    /// Connection ids wired on the map; empty means "anything goes".
    pub wired_connections: HashSet<i64>,
    pub connections: Vec<FiredConnection>,
    pub clock: GameTime,
    pub spoken: Vec<SpokenLine>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coin item and its value in the smallest currency unit.
    pub fn add_denomination(&mut self, item: &str, value: u64) {
        self.denominations.push((item.to_string(), value));
        self.denominations.sort_by(|a, b| b.1.cmp(&a.1));
    }

    pub fn give(&mut self, holder: &Entity, item: &str, quantity: u64) {
        *self.holdings.entry((holder.id, item.to_string())).or_default() += quantity;
    }

    pub fn set_level(&mut self, actor: &Entity, skill: Option<&str>, level: u32) {
        self.levels.insert((actor.id, skill.map(str::to_string)), level);
    }

    /// The raw stored value of `key`, bypassing flag decoding.
    pub fn raw_key(&self, owner: &Entity, key: &str) -> Option<&str> {
        self.keys.get(&(owner.id, key.to_string())).map(String::as_str)
    }

    /// Text of every line spoken so far, oldest first.
    pub fn transcript(&self) -> Vec<&str> {
        self.spoken.iter().map(|line| line.text.as_str()).collect()
    }

    fn is_denomination(&self, item: &str) -> bool {
        self.denominations.iter().any(|(name, _)| name == item)
    }

    fn check_catalog(&self, item: &str) -> Result<()> {
        if !self.catalog.is_empty() && !self.catalog.contains(item) && !self.is_denomination(item) {
            bail!("item '{item}' is not in the host catalog");
        }
        Ok(())
    }

    /// Split `amount` into coins, largest denomination first.
    fn make_change(&self, amount: u64) -> Result<Vec<(String, u64)>> {
        if amount == 0 {
            return Ok(Vec::new());
        }
        if self.denominations.is_empty() {
            bail!("no currency denominations registered");
        }
        let mut remaining = amount;
        let mut coins = Vec::new();
        for (coin, value) in &self.denominations {
            let count = remaining / value;
            if count > 0 {
                coins.push((coin.clone(), count));
                remaining -= count * value;
            }
        }
        if remaining > 0 {
            bail!("cannot represent {amount} with the registered denominations");
        }
        Ok(coins)
    }
}

impl FlagBackend for MemoryHost {
    fn read_key(&self, owner: &Entity, key: &str) -> Option<String> {
        self.keys.get(&(owner.id, key.to_string())).cloned()
    }

    fn write_key(&mut self, owner: &Entity, key: &str, value: &str, persist: bool) {
        let slot = (owner.id, key.to_string());
        if persist {
            self.persisted.insert(slot.clone());
        } else {
            self.persisted.remove(&slot);
        }
        self.keys.insert(slot, value.to_string());
    }
}

impl Inventory for MemoryHost {
    fn count_item(&self, holder: &Entity, item: &str) -> u64 {
        self.holdings
            .get(&(holder.id, item.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn currency_total(&self, holder: &Entity) -> u64 {
        self.denominations
            .iter()
            .map(|(coin, value)| self.count_item(holder, coin) * value)
            .sum()
    }

    fn create_item(&mut self, holder: &Entity, item: &str, quantity: u64) -> Result<()> {
        self.check_catalog(item)?;
        self.give(holder, item, quantity);
        Ok(())
    }

    fn destroy_item(&mut self, holder: &Entity, item: &str, quantity: u64) -> Result<()> {
        let held = self.count_item(holder, item);
        if held < quantity {
            bail!("'{}' holds {held} of '{item}', cannot destroy {quantity}", holder.name);
        }
        let slot = (holder.id, item.to_string());
        if held == quantity {
            self.holdings.remove(&slot);
        } else {
            self.holdings.insert(slot, held - quantity);
        }
        Ok(())
    }

    fn transfer_item(&mut self, from: &Entity, to: &Entity, item: &str, quantity: u64) -> Result<()> {
        self.destroy_item(from, item, quantity)?;
        self.give(to, item, quantity);
        Ok(())
    }

    fn withdraw_currency(&mut self, holder: &Entity, amount: u64) -> Result<()> {
        let total = self.currency_total(holder);
        if total < amount {
            bail!("'{}' has {total} in currency, cannot pay {amount}", holder.name);
        }
        // holdings are only touched once the change is known to be payable
        let change = self.make_change(total - amount)?;
        let coins: Vec<String> = self.denominations.iter().map(|(c, _)| c.clone()).collect();
        for coin in &coins {
            self.holdings.remove(&(holder.id, coin.clone()));
        }
        for (coin, count) in change {
            self.give(holder, &coin, count);
        }
        Ok(())
    }

    fn deposit_currency(&mut self, holder: &Entity, amount: u64) -> Result<()> {
        for (coin, count) in self.make_change(amount)? {
            self.give(holder, &coin, count);
        }
        Ok(())
    }
}

impl QuestLog for MemoryHost {
    fn quest_stage(&self, actor: &Entity, quest: &str) -> Option<u32> {
        self.quests.get(&(actor.id, quest.to_string())).copied()
    }

    fn start_quest(&mut self, actor: &Entity, quest: &str, stage: u32) -> Result<()> {
        if !self.known_quests.is_empty() && !self.known_quests.contains(quest) {
            bail!("quest '{quest}' is not registered");
        }
        info!("quest '{quest}' started for '{}' at stage {stage}", actor.name);
        self.quests.insert((actor.id, quest.to_string()), stage);
        Ok(())
    }

    fn set_quest_stage(&mut self, actor: &Entity, quest: &str, stage: u32) -> Result<()> {
        let Some(current) = self.quests.get_mut(&(actor.id, quest.to_string())) else {
            bail!("quest '{quest}' was never started for '{}'", actor.name);
        };
        *current = stage;
        Ok(())
    }
}

impl Attributes for MemoryHost {
    fn level(&self, actor: &Entity, skill: Option<&str>) -> Option<u32> {
        self.levels.get(&(actor.id, skill.map(str::to_string))).copied()
    }
}

impl MapLinks for MemoryHost {
    fn trigger_connection(&mut self, id: i64, state: bool, source: &Entity) -> Result<()> {
        if !self.wired_connections.is_empty() && !self.wired_connections.contains(&id) {
            bail!("nothing on the map is wired to connection {id}");
        }
        self.connections.push(FiredConnection {
            id,
            state,
            source: source.id,
        });
        Ok(())
    }
}

impl GameClock for MemoryHost {
    fn now(&self) -> GameTime {
        self.clock
    }
}

impl Speech for MemoryHost {
    fn say(&mut self, speaker: &Entity, listener: &Entity, text: &str) {
        self.spoken.push(SpokenLine {
            speaker: speaker.id,
            listener: listener.id,
            text: text.to_string(),
        });
    }
}
