//! Raw effect translation.
//!
//! Turns the string arrays of a rule's `post` list into [`Effect`]s. A two-element
//! array with no known tag is the classic `[flag, value]` form. Any other untagged
//! array becomes a custom effect, resolved against the host's registry when the rule
//! fires.

use anyhow::{Result, bail};

use super::raw_condition::parse_number;
use crate::flags::FlagName;
use crate::rule::Effect;
use parley_data::tags;

/// Convert one `post` entry.
///
/// # Errors
/// - on an unknown arity for a tagged form, a bad number, or an unusable flag name
pub fn cook_effect(args: &[String]) -> Result<Effect> {
    let Some((head, rest)) = args.split_first() else {
        bail!("empty postcondition");
    };
    match head.as_str() {
        tags::SET_FLAG => match rest {
            [name, value] => cook_set_flag(name, value),
            _ => bail!("setflag takes a flag name and a value, got {rest:?}"),
        },
        tags::SET_QUEST => cook_set_quest(rest),
        tags::GIVE_ITEM => {
            let (item, quantity) = item_and_quantity(head, rest)?;
            Ok(Effect::GiveItem { item, quantity })
        },
        tags::TAKE_ITEM => {
            let (item, quantity) = item_and_quantity(head, rest)?;
            Ok(Effect::TakeItem { item, quantity })
        },
        tags::CONNECTION => match rest {
            [id] => Ok(Effect::TriggerConnection {
                id: parse_number(id, "connection id")?,
            }),
            _ => bail!("connection takes one connection id, got {rest:?}"),
        },
        tags::MARK_TIME => match rest {
            [flag] => Ok(Effect::MarkTimestamp {
                flag: FlagName::new(flag.as_str())?.as_str().to_string(),
            }),
            _ => bail!("marktime takes one flag name, got {rest:?}"),
        },
        tags::CALLBACK if rest.is_empty() => Ok(Effect::Callback),
        tags::CALLBACK => bail!("callback takes no arguments, got {rest:?}"),
        _ if rest.len() == 1 => cook_set_flag(head, &rest[0]),
        kind => Ok(Effect::Custom {
            kind: kind.to_string(),
            args: rest.to_vec(),
        }),
    }
}

fn cook_set_flag(name: &str, value: &str) -> Result<Effect> {
    let name = FlagName::new(name)?;
    Ok(Effect::set_flag(name.as_str(), value))
}

fn cook_set_quest(args: &[String]) -> Result<Effect> {
    let [quest, stage] = args else {
        bail!("setquest takes a quest name and a stage, got {args:?}");
    };
    Ok(Effect::AdvanceQuest {
        quest: quest.clone(),
        stage: parse_number(stage, "quest stage")?,
    })
}

fn item_and_quantity(tag: &str, args: &[String]) -> Result<(String, u64)> {
    match args {
        [item] => Ok((item.clone(), 1)),
        [item, quantity] => Ok((item.clone(), parse_number(quantity, "item quantity")?)),
        _ => bail!("{tag} takes an item name and an optional quantity, got {args:?}"),
    }
}
