//! Dialogue engine.
//!
//! A [`Dialog`] holds the ordered rules of one conversation. Answering an utterance
//! happens in two steps:
//!
//! 1. [`Dialog::select`] is pure: it reads a flag snapshot and host state, finds the
//!    first rule whose keywords match and whose preconditions hold, and returns the
//!    chosen response together with the effects to apply.
//! 2. [`Dialog::speak`] commits a selection: the response is said first, then each
//!    effect is applied in order, then the rule's continuation runs.
//!
//! Nothing that goes wrong while committing escapes `speak`. Failed effects are logged
//! with the namespace, rule index and effect kind, and the remaining effects still run.

use std::sync::LazyLock;

use log::{debug, error, info, warn};
use rand::Rng;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::config::EngineConfig;
use crate::error::DialogError;
use crate::flags::{FlagSnapshot, WILDCARD};
use crate::host::{Entity, GameHost, Speech};
use crate::loader::RuleSet;
use crate::rule::{ApplyContext, Effect, EffectRegistry, EvalContext, Rule, apply_effect, run_continuation};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$(me|you)\b").expect("valid placeholder regex"));

/// The participants of one dialogue and the namespace its flags live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Whoever is talking to the NPC; flags, items and quests are theirs.
    pub actor: Entity,
    /// The NPC answering.
    pub speaker: Entity,
    pub namespace: String,
}
impl Conversation {
    pub fn new(actor: Entity, speaker: Entity, namespace: impl Into<String>) -> Self {
        Self {
            actor,
            speaker,
            namespace: namespace.into(),
        }
    }
}

/// How a rule keyword is compared with an utterance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The keyword's words must appear as consecutive whole words of the utterance.
    ExactToken,
    /// The keyword must appear anywhere in the utterance.
    #[default]
    Substring,
}

/// Outcome of [`Dialog::speak`].
#[derive(Debug, Clone, PartialEq, Eq, Variantly)]
pub enum MatchResult {
    Handled { rule_index: usize, response: String },
    Unhandled,
}

/// A rule chosen for an utterance, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub rule_index: usize,
    /// Response with placeholders already filled in.
    pub response: String,
    pub effects: Vec<Effect>,
}

/// True if `keyword` matches `utterance` under `mode`. Case is ignored.
pub fn keyword_matches(keyword: &str, utterance: &str, mode: MatchMode) -> bool {
    if keyword == WILDCARD {
        return true;
    }
    let keyword = keyword.to_lowercase();
    let utterance = utterance.to_lowercase();
    match mode {
        MatchMode::Substring => utterance.contains(&keyword),
        MatchMode::ExactToken => {
            let wanted = tokenize(&keyword);
            if wanted.is_empty() {
                return false;
            }
            let heard = tokenize(&utterance);
            heard.windows(wanted.len()).any(|window| window == wanted.as_slice())
        },
    }
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Replace `$me` with the speaker's name and `$you` with the actor's.
pub fn fill_placeholders(text: &str, conversation: &Conversation) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match &caps[1] {
            "me" => conversation.speaker.name.clone(),
            _ => conversation.actor.name.clone(),
        })
        .into_owned()
}

/// The rules of one conversation plus everything needed to run them.
#[derive(Debug, Clone, Default)]
pub struct Dialog {
    rules: Vec<Rule>,
    config: EngineConfig,
    registry: EffectRegistry,
}

impl Dialog {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn from_rule_set(rule_set: RuleSet) -> Self {
        Self::new(rule_set.rules)
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: EffectRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.config.match_mode = mode;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry_mut(&mut self) -> &mut EffectRegistry {
        &mut self.registry
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn push_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Insert a rule at `index`, or at the end if `index` is past it.
    pub fn insert_rule(&mut self, index: usize, rule: Rule) {
        let index = index.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    /// Current flags of the conversation's namespace.
    pub fn flags(&self, host: &dyn GameHost, conversation: &Conversation) -> FlagSnapshot {
        self.config
            .flag_store()
            .snapshot(host, &conversation.actor, &conversation.namespace)
    }

    /// Find the first rule that answers `utterance`, without changing anything.
    pub fn select<R: Rng + ?Sized>(
        &self,
        host: &dyn GameHost,
        conversation: &Conversation,
        utterance: &str,
        rng: &mut R,
    ) -> Option<Selection> {
        let flags = self.flags(host, conversation);
        let ctx = EvalContext {
            host,
            conversation,
            flags: &flags,
            config: &self.config,
        };
        let mode = self.config.match_mode;
        let (rule_index, rule) = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.matches(utterance, mode))
            .find(|(i, rule)| {
                let eligible = rule.is_eligible(&ctx);
                if !eligible {
                    debug!("rule {i} ('{}') matched but is not eligible", rule.match_string());
                }
                eligible
            })?;
        Some(Selection {
            rule_index,
            response: fill_placeholders(rule.choose_response(rng), conversation),
            effects: rule.effects().to_vec(),
        })
    }

    /// Answer `utterance`, applying the chosen rule's effects.
    pub fn speak(&self, host: &mut dyn GameHost, conversation: &Conversation, utterance: &str) -> MatchResult {
        self.speak_with_rng(host, conversation, utterance, &mut rand::rng())
    }

    /// [`Dialog::speak`] with a caller-supplied source of randomness.
    pub fn speak_with_rng<R: Rng + ?Sized>(
        &self,
        host: &mut dyn GameHost,
        conversation: &Conversation,
        utterance: &str,
        rng: &mut R,
    ) -> MatchResult {
        let Some(selection) = self.select(&*host, conversation, utterance, rng) else {
            debug!("[{}] no rule answers \"{utterance}\"", conversation.namespace);
            return MatchResult::Unhandled;
        };
        info!(
            "[{}] rule {} answers \"{utterance}\"",
            conversation.namespace, selection.rule_index
        );
        self.commit(host, conversation, &selection);
        MatchResult::Handled {
            rule_index: selection.rule_index,
            response: selection.response,
        }
    }

    /// Say the selected response, apply its effects, then run the continuation.
    pub fn commit(&self, host: &mut dyn GameHost, conversation: &Conversation, selection: &Selection) {
        host.say(&conversation.speaker, &conversation.actor, &selection.response);

        let Some(rule) = self.rules.get(selection.rule_index) else {
            error!(
                "[{}] selected rule {} no longer exists",
                conversation.namespace, selection.rule_index
            );
            return;
        };
        let store = self.config.flag_store();
        let ctx = ApplyContext {
            conversation,
            config: &self.config,
            store: &store,
            registry: &self.registry,
            rule,
        };
        for effect in &selection.effects {
            if let Err(e) = apply_effect(host, &ctx, effect) {
                report_failure(conversation, selection.rule_index, effect, &e);
            }
        }
        if !rule.has_callback_effect() {
            run_continuation(host, &ctx);
        }
    }
}

fn report_failure(conversation: &Conversation, rule_index: usize, effect: &Effect, err: &DialogError) {
    let ns = &conversation.namespace;
    let kind = effect.kind();
    if err.is_correctable() {
        warn!("[{ns}] rule {rule_index}, effect '{kind}': {err}");
    } else {
        error!("[{ns}] rule {rule_index}, effect '{kind}': {err}");
    }
}
