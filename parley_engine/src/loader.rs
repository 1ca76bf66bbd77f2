//! Loader for rule-set documents.
//!
//! A rule set is either built inline (a `Vec<Rule>` handed to [`RuleSet::new`]) or read
//! from a JSON document of the form
//!
//! ```json
//! { "location": "gork",
//!   "rules": [ { "match": "hello|hi", "pre": [["greeted", "0"]],
//!                "post": [["greeted", "1"]], "msg": ["Hi!"], "connected": 3 } ] }
//! ```
//!
//! Loading is all or nothing: the document is validated as a whole, every problem is
//! reported at once, and no partial rule set is ever returned.

pub mod raw_condition;
pub mod raw_effect;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::info;
use parley_data::{RuleDef, RuleSetDef, validate_rule_set};

use crate::dialog::Conversation;
use crate::error::DialogError;
use crate::host::Entity;
use crate::rule::{Action, Effect, Predicate, Rule};
use raw_condition::cook_precondition;
use raw_effect::cook_effect;

/// The ordered rules of one conversation location.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    /// Namespace the conversation's flags are stored under.
    pub location: String,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(location: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            location: location.into(),
            rules,
        }
    }

    /// Conversation between `actor` and `speaker` using this rule set's location as namespace.
    pub fn conversation(&self, actor: Entity, speaker: Entity) -> Conversation {
        Conversation::new(actor, speaker, self.location.clone())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Attach a guard to the rule at `index`, replacing any earlier one.
    ///
    /// # Errors
    /// - if there is no rule at `index`
    pub fn attach_guard(&mut self, index: usize, guard: Predicate) -> Result<(), DialogError> {
        self.rule_at(index)?.set_guard(guard);
        Ok(())
    }

    /// Attach a continuation to the rule at `index`.
    ///
    /// # Errors
    /// - if there is no rule at `index`
    pub fn attach_continuation(&mut self, index: usize, action: Action) -> Result<(), DialogError> {
        self.rule_at(index)?.set_continuation(action);
        Ok(())
    }

    fn rule_at(&mut self, index: usize) -> Result<&mut Rule, DialogError> {
        let len = self.rules.len();
        self.rules.get_mut(index).ok_or_else(|| {
            DialogError::MalformedRuleSet(format!("rule index {index} out of range ({len} rules)"))
        })
    }

    /// Re-derive the document form of this rule set.
    ///
    /// A trailing connection effect is written back as the rule's `connected` field.
    pub fn to_def(&self) -> RuleSetDef {
        RuleSetDef {
            location: self.location.clone(),
            rules: self.rules.iter().map(rule_to_def).collect(),
        }
    }
}

fn rule_to_def(rule: &Rule) -> RuleDef {
    let mut effects = rule.effects();
    let mut connected = None;
    if let [rest @ .., Effect::TriggerConnection { id }] = effects {
        connected = Some(*id);
        effects = rest;
    }
    RuleDef {
        keywords: rule.match_string(),
        pre: rule.preconditions().iter().map(|p| p.to_args()).collect(),
        post: effects.iter().map(Effect::to_args).collect(),
        msg: rule.responses().to_vec(),
        connected,
    }
}

/// Parse and build a rule set from JSON text.
///
/// # Errors
/// - `MalformedRuleSet` if the text is not a valid rule-set document
pub fn load_rule_set_str(text: &str) -> Result<RuleSet, DialogError> {
    let def: RuleSetDef = serde_json::from_str(text)
        .map_err(|e| DialogError::MalformedRuleSet(format!("parsing rule-set document: {e}")))?;
    build_rule_set(&def)
}

/// Build a rule set from an already parsed JSON value, such as one embedded in other data.
///
/// # Errors
/// - `MalformedRuleSet` if the value is not a valid rule-set document
pub fn load_rule_set_value(value: serde_json::Value) -> Result<RuleSet, DialogError> {
    let def: RuleSetDef = serde_json::from_value(value)
        .map_err(|e| DialogError::MalformedRuleSet(format!("reading rule-set document: {e}")))?;
    build_rule_set(&def)
}

/// Read, parse and build a rule set from a JSON file.
///
/// # Errors
/// - `MalformedRuleSet` if the file cannot be read or is not a valid rule-set document
pub fn load_rule_set_file(path: &Path) -> Result<RuleSet, DialogError> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading rule set from '{}'", path.display()))
        .map_err(|e| DialogError::MalformedRuleSet(format!("{e:#}")))?;
    let rule_set = load_rule_set_str(&text)?;
    info!(
        "{} dialogue rules loaded for '{}' from '{}'",
        rule_set.len(),
        rule_set.location,
        path.display()
    );
    Ok(rule_set)
}

/// Validate a document and convert it to runtime rules, in document order.
///
/// # Errors
/// - `MalformedRuleSet` listing every validation problem, or the first conversion failure
pub fn build_rule_set(def: &RuleSetDef) -> Result<RuleSet, DialogError> {
    try_build_rule_set(def).map_err(|e| DialogError::MalformedRuleSet(format!("{e:#}")))
}

fn try_build_rule_set(def: &RuleSetDef) -> Result<RuleSet> {
    validate_def(def)?;
    let rules = def
        .rules
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            cook_rule(raw).with_context(|| format!("rule {i} ('{}') of '{}'", raw.keywords, def.location))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RuleSet::new(def.location.clone(), rules))
}

fn validate_def(def: &RuleSetDef) -> Result<()> {
    let errors = validate_rule_set(def);
    if errors.is_empty() {
        return Ok(());
    }
    let details = errors
        .into_iter()
        .map(|err| format!("- {err}"))
        .collect::<Vec<_>>()
        .join("\n");
    bail!("rule set '{}' failed validation:\n{details}", def.location);
}

/// Convert one raw rule. A `connected` id becomes a connection effect after the others.
fn cook_rule(raw: &RuleDef) -> Result<Rule> {
    let preconditions = raw
        .pre
        .iter()
        .map(|args| cook_precondition(args).with_context(|| format!("precondition {args:?}")))
        .collect::<Result<Vec<_>>>()?;
    let mut effects = raw
        .post
        .iter()
        .map(|args| cook_effect(args).with_context(|| format!("postcondition {args:?}")))
        .collect::<Result<Vec<_>>>()?;
    if let Some(id) = raw.connected {
        effects.push(Effect::TriggerConnection { id });
    }
    Ok(Rule::new(&raw.keywords, raw.msg.iter().cloned())?
        .with_preconditions(preconditions)
        .with_effects(effects))
}
