//! Raw precondition translation.
//!
//! Turns the string arrays of a rule's `pre` list into typed [`Precondition`]s.

use anyhow::{Context, Result, bail};

use crate::calendar::GameSpan;
use crate::flags::FlagName;
use crate::rule::Precondition;
use parley_data::tags;

/// Convert one `pre` entry.
///
/// # Errors
/// - on an unknown arity for a tagged form, a bad number, or an unusable flag name
pub fn cook_precondition(args: &[String]) -> Result<Precondition> {
    let Some((head, rest)) = args.split_first() else {
        bail!("empty precondition");
    };
    match head.as_str() {
        tags::TOKEN => cook_flag(rest),
        tags::ITEM => cook_item(rest),
        tags::QUEST => cook_quest(rest),
        tags::LEVEL => cook_level(rest),
        tags::AGE => cook_age(rest),
        _ => cook_flag(args),
    }
}

fn cook_flag(args: &[String]) -> Result<Precondition> {
    let [name, values @ ..] = args else {
        bail!("flag precondition without a flag name");
    };
    if values.is_empty() {
        bail!("flag precondition '{name}' lists no accepted values");
    }
    let name = FlagName::new(name.as_str())?;
    Ok(Precondition::flag(name.as_str(), values))
}

fn cook_item(args: &[String]) -> Result<Precondition> {
    match args {
        [item] => Ok(Precondition::Item {
            item: item.clone(),
            count: 1,
        }),
        [item, count] => Ok(Precondition::Item {
            item: item.clone(),
            count: parse_number(count, "item count")?,
        }),
        _ => bail!("item precondition takes a name and an optional count, got {args:?}"),
    }
}

fn cook_quest(args: &[String]) -> Result<Precondition> {
    let [quest, stage] = args else {
        bail!("quest precondition takes a quest name and a stage, got {args:?}");
    };
    Ok(Precondition::Quest {
        quest: quest.clone(),
        stage: parse_number(stage, "quest stage")?,
    })
}

fn cook_level(args: &[String]) -> Result<Precondition> {
    match args {
        [level] => Ok(Precondition::Level {
            skill: None,
            level: parse_number(level, "level")?,
        }),
        [skill, level] => Ok(Precondition::Level {
            skill: Some(skill.clone()),
            level: parse_number(level, "level")?,
        }),
        _ => bail!("level precondition takes an optional skill and a level, got {args:?}"),
    }
}

fn cook_age(args: &[String]) -> Result<Precondition> {
    let [flag, fields @ ..] = args else {
        bail!("age precondition without a flag name");
    };
    let [years, months, days, hours, minutes] = fields else {
        bail!("age precondition on '{flag}' needs years, months, days, hours and minutes");
    };
    let n = |field: &String| parse_number::<u32>(field, "age field");
    let flag = FlagName::new(flag.as_str())?;
    Ok(Precondition::Age {
        flag: flag.as_str().to_string(),
        span: GameSpan::new(n(years)?, n(months)?, n(days)?, n(hours)?, n(minutes)?),
    })
}

pub(super) fn parse_number<T>(text: &str, what: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.trim()
        .parse::<T>()
        .with_context(|| format!("{what} '{text}' is not a valid number"))
}
