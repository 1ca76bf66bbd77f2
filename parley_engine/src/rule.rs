//! Rule module --
//!
//! A `Rule` pairs the keywords that can trigger it with the lines it may answer with,
//! the `Precondition`s that must all hold for it to be eligible, and the `Effect`s
//! applied after it fires. Hosts may also attach a guard (an extra eligibility check)
//! and a continuation (code run after the effects).

pub mod condition;
pub mod effect;

pub use condition::*;
pub use effect::*;

use std::sync::Arc;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::dialog::{Conversation, MatchMode, keyword_matches};
use crate::error::DialogError;
use crate::host::GameHost;

/// Separates alternative keywords in a rule's match string.
pub const KEYWORD_SEPARATOR: char = '|';

/// Extra eligibility check supplied by the host.
pub type Predicate = Arc<dyn Fn(&Conversation, &Rule, &dyn GameHost) -> bool + Send + Sync>;
/// Code run after a rule's effects (or at its `callback` effect).
pub type Action = Arc<dyn Fn(&Conversation, &Rule, &mut dyn GameHost) + Send + Sync>;

/// One keyword-triggered response.
#[derive(Clone)]
pub struct Rule {
    keywords: Vec<String>,
    responses: Vec<String>,
    preconditions: Vec<Precondition>,
    effects: Vec<Effect>,
    guard: Option<Predicate>,
    continuation: Option<Action>,
}

impl Rule {
    /// Create a rule answering any of the `|`-separated `keywords` with one of `responses`.
    ///
    /// # Errors
    /// - `MalformedRuleSet` if there are no keywords or no responses
    pub fn new(keywords: &str, responses: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, DialogError> {
        let keywords = parse_keywords(keywords);
        if keywords.is_empty() {
            return Err(DialogError::MalformedRuleSet("rule has no keywords".into()));
        }
        let responses: Vec<String> = responses.into_iter().map(Into::into).collect();
        if responses.is_empty() {
            return Err(DialogError::MalformedRuleSet(format!(
                "rule '{}' has no responses",
                keywords.join("|")
            )));
        }
        Ok(Self {
            keywords,
            responses,
            preconditions: Vec::new(),
            effects: Vec::new(),
            guard: None,
            continuation: None,
        })
    }

    #[must_use]
    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    #[must_use]
    pub fn with_preconditions(mut self, preconditions: impl IntoIterator<Item = Precondition>) -> Self {
        self.preconditions.extend(preconditions);
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    #[must_use]
    pub fn with_guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&Conversation, &Rule, &dyn GameHost) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    #[must_use]
    pub fn with_continuation<F>(mut self, continuation: F) -> Self
    where
        F: Fn(&Conversation, &Rule, &mut dyn GameHost) + Send + Sync + 'static,
    {
        self.continuation = Some(Arc::new(continuation));
        self
    }

    pub(crate) fn set_guard(&mut self, guard: Predicate) {
        self.guard = Some(guard);
    }

    pub(crate) fn set_continuation(&mut self, continuation: Action) {
        self.continuation = Some(continuation);
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn guard(&self) -> Option<&Predicate> {
        self.guard.as_ref()
    }

    pub fn continuation(&self) -> Option<&Action> {
        self.continuation.as_ref()
    }

    /// Keywords joined back into their document form.
    pub fn match_string(&self) -> String {
        self.keywords.join("|")
    }

    /// True if any keyword matches the utterance.
    pub fn matches(&self, utterance: &str, mode: MatchMode) -> bool {
        self.keywords.iter().any(|k| keyword_matches(k, utterance, mode))
    }

    /// True if every precondition holds and the guard (if any) agrees.
    pub fn is_eligible(&self, ctx: &EvalContext<'_>) -> bool {
        self.preconditions.iter().all(|p| p.is_satisfied(ctx))
            && self
                .guard
                .as_ref()
                .is_none_or(|guard| guard(ctx.conversation, self, ctx.host))
    }

    /// True if the effects contain an explicit `callback` step.
    pub fn has_callback_effect(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, Effect::Callback))
    }

    /// Pick one of the responses, uniformly at random.
    pub fn choose_response<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        if self.responses.len() == 1 {
            return &self.responses[0];
        }
        self.responses.choose(rng).map_or("", String::as_str)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("keywords", &self.keywords)
            .field("responses", &self.responses)
            .field("preconditions", &self.preconditions)
            .field("effects", &self.effects)
            .field("guard", &self.guard.is_some())
            .field("continuation", &self.continuation.is_some())
            .finish()
    }
}

/// Rules compare equal on their data; attached closures are ignored.
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.keywords == other.keywords
            && self.responses == other.responses
            && self.preconditions == other.preconditions
            && self.effects == other.effects
    }
}

/// Split a match string on `|`, trimming and lowercasing each keyword.
pub fn parse_keywords(match_string: &str) -> Vec<String> {
    match_string
        .split(KEYWORD_SEPARATOR)
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
