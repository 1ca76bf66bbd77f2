//! Rule postconditions ("effects").
//!
//! Effects run only after a rule has been selected and its response spoken. They are a
//! closed set of built-in kinds plus whatever custom kinds the host registers in an
//! [`EffectRegistry`]. A custom kind nobody registered fails with
//! [`DialogError::UnknownEffectKind`] instead of being ignored.
//!
//! # Logging
//!
//! Every applied effect logs one line in a consistent format:
//! ```text
//! └─ effect: EffectKind(parameters) [namespace]
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use anyhow::{Result, bail};
use log::{debug, info};

use crate::config::EngineConfig;
use crate::dialog::Conversation;
use crate::error::DialogError;
use crate::flags::{FlagName, FlagStore};
use crate::host::{GameClock, GameHost, Inventory, MapLinks, QuestLog};
use crate::rule::Rule;
use parley_data::tags;

/// Something a rule does after it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Store `value` in flag `name`; `*` leaves the flag alone.
    SetFlag { name: String, value: String },
    /// Start `quest` at `stage`, or move it forward to `stage`.
    AdvanceQuest { quest: String, stage: u32 },
    /// Move items from the speaker to the actor; `0` means one.
    ///
    /// The configured currency item is not taken from the speaker: the host mints it
    /// straight into the actor's purse.
    GiveItem { item: String, quantity: u64 },
    /// Destroy items held by the actor; `0` means the whole stack.
    TakeItem { item: String, quantity: u64 },
    /// Signal a map connection.
    TriggerConnection { id: i64 },
    /// Store the current in-game time in `flag`.
    MarkTimestamp { flag: String },
    /// Run the rule's continuation at this point.
    Callback,
    /// A kind resolved through the [`EffectRegistry`] at apply time.
    Custom { kind: String, args: Vec<String> },
}

impl Effect {
    pub fn set_flag(name: &str, value: &str) -> Self {
        Self::SetFlag {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Tag naming this effect's kind in documents and logs.
    pub fn kind(&self) -> &str {
        match self {
            Self::SetFlag { .. } => tags::SET_FLAG,
            Self::AdvanceQuest { .. } => tags::SET_QUEST,
            Self::GiveItem { .. } => tags::GIVE_ITEM,
            Self::TakeItem { .. } => tags::TAKE_ITEM,
            Self::TriggerConnection { .. } => tags::CONNECTION,
            Self::MarkTimestamp { .. } => tags::MARK_TIME,
            Self::Callback => tags::CALLBACK,
            Self::Custom { kind, .. } => kind,
        }
    }

    /// Canonical document form of this effect.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::SetFlag { name, value } => {
                // the two-element form is only unambiguous when the name is not a tag
                if tags::is_effect_tag(name) {
                    vec![tags::SET_FLAG.into(), name.clone(), value.clone()]
                } else {
                    vec![name.clone(), value.clone()]
                }
            },
            Self::AdvanceQuest { quest, stage } => vec![tags::SET_QUEST.into(), quest.clone(), stage.to_string()],
            Self::GiveItem { item, quantity } => vec![tags::GIVE_ITEM.into(), item.clone(), quantity.to_string()],
            Self::TakeItem { item, quantity } => vec![tags::TAKE_ITEM.into(), item.clone(), quantity.to_string()],
            Self::TriggerConnection { id } => vec![tags::CONNECTION.into(), id.to_string()],
            Self::MarkTimestamp { flag } => vec![tags::MARK_TIME.into(), flag.clone()],
            Self::Callback => vec![tags::CALLBACK.into()],
            Self::Custom { kind, args } => {
                let mut out = vec![kind.clone()];
                out.extend(args.iter().cloned());
                out
            },
        }
    }
}

impl Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.to_args().join(", "))
    }
}

/// Handler for a host-defined effect kind.
pub trait EffectHandler: Send + Sync {
    /// # Errors
    /// - whenever the effect cannot be carried out
    fn apply(&self, host: &mut dyn GameHost, conversation: &Conversation, args: &[String]) -> Result<()>;
}
impl<F> EffectHandler for F
where
    F: Fn(&mut dyn GameHost, &Conversation, &[String]) -> Result<()> + Send + Sync,
{
    fn apply(&self, host: &mut dyn GameHost, conversation: &Conversation, args: &[String]) -> Result<()> {
        self(host, conversation, args)
    }
}

/// Host-registered effect kinds, looked up by tag.
#[derive(Clone, Default)]
pub struct EffectRegistry {
    handlers: HashMap<String, Arc<dyn EffectHandler>>,
}
impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("EffectRegistry").field("kinds", &kinds).finish()
    }
}
impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`, replacing any earlier handler for it.
    ///
    /// # Errors
    /// - if `kind` is empty or names a built-in effect
    pub fn register(&mut self, kind: &str, handler: impl EffectHandler + 'static) -> Result<()> {
        if kind.is_empty() || tags::is_effect_tag(kind) {
            bail!("cannot register custom effect kind '{kind}': empty or built in");
        }
        info!("custom effect kind '{kind}' registered");
        self.handlers.insert(kind.to_string(), Arc::new(handler));
        Ok(())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    fn get(&self, kind: &str) -> Option<&Arc<dyn EffectHandler>> {
        self.handlers.get(kind)
    }
}

/// What an effect handler needs besides the host.
pub struct ApplyContext<'a> {
    pub conversation: &'a Conversation,
    pub config: &'a EngineConfig,
    pub store: &'a FlagStore,
    pub registry: &'a EffectRegistry,
    pub rule: &'a Rule,
}

/// Carry out a single effect.
///
/// # Errors
/// - `InvalidQuestRegression` when a quest would move backwards (nothing changes)
/// - `MissingExternalEntity` when the host lacks a referenced item, quest or connection
/// - `UnknownEffectKind` for custom kinds without a registered handler
/// - `ReservedSeparator` for flag names or values that cannot be stored
pub fn apply_effect(host: &mut dyn GameHost, ctx: &ApplyContext<'_>, effect: &Effect) -> Result<(), DialogError> {
    use Effect::*;
    match effect {
        SetFlag { name, value } => set_flag(host, ctx, name, value),
        AdvanceQuest { quest, stage } => advance_quest(host, ctx, quest, *stage),
        GiveItem { item, quantity } => give_item(host, ctx, item, *quantity),
        TakeItem { item, quantity } => take_item(host, ctx, item, *quantity),
        TriggerConnection { id } => trigger_connection(host, ctx, *id),
        MarkTimestamp { flag } => mark_timestamp(host, ctx, flag),
        Callback => {
            run_continuation(host, ctx);
            Ok(())
        },
        Custom { kind, args } => run_custom(host, ctx, kind, args),
    }
}

/*
 *
 * EFFECT HANDLERS
 *
 */

/// Write a flag in the conversation's namespace.
pub fn set_flag(host: &mut dyn GameHost, ctx: &ApplyContext<'_>, name: &str, value: &str) -> Result<(), DialogError> {
    let conv = ctx.conversation;
    let flag = FlagName::new(name)?;
    ctx.store.write(host, &conv.actor, &conv.namespace, &flag, value)?;
    info!("└─ effect: SetFlag(\"{name}\", \"{value}\") [{}]", conv.namespace);
    Ok(())
}

/// Start a quest or move it forward. Moving backwards is refused.
pub fn advance_quest(
    host: &mut dyn GameHost,
    ctx: &ApplyContext<'_>,
    quest: &str,
    stage: u32,
) -> Result<(), DialogError> {
    let actor = &ctx.conversation.actor;
    match host.quest_stage(actor, quest) {
        None => host
            .start_quest(actor, quest, stage)
            .map_err(|e| DialogError::missing("quest", quest, format!("{e:#}")))?,
        Some(current) if current > stage => {
            return Err(DialogError::InvalidQuestRegression {
                quest: quest.to_string(),
                current,
                requested: stage,
            });
        },
        Some(current) if current == stage => {
            debug!("quest '{quest}' already at stage {stage}");
            return Ok(());
        },
        Some(_) => host
            .set_quest_stage(actor, quest, stage)
            .map_err(|e| DialogError::missing("quest", quest, format!("{e:#}")))?,
    }
    info!("└─ effect: AdvanceQuest(\"{quest}\", {stage}) [{}]", ctx.conversation.namespace);
    Ok(())
}

/// Hand items from the speaker to the actor, or pay the actor newly minted currency.
pub fn give_item(
    host: &mut dyn GameHost,
    ctx: &ApplyContext<'_>,
    item: &str,
    quantity: u64,
) -> Result<(), DialogError> {
    let conv = ctx.conversation;
    let quantity = quantity.max(1);
    if item == ctx.config.currency_item {
        host.deposit_currency(&conv.actor, quantity)
            .map_err(|e| DialogError::missing("currency", item, format!("{e:#}")))?;
    } else {
        host.transfer_item(&conv.speaker, &conv.actor, item, quantity)
            .map_err(|e| DialogError::missing("item", item, format!("{e:#}")))?;
    }
    info!(
        "└─ effect: GiveItem(\"{item}\" x{quantity}, {} -> {}) [{}]",
        conv.speaker.name, conv.actor.name, conv.namespace
    );
    Ok(())
}

/// Destroy items (or currency) held by the actor. Quantity `0` takes everything.
pub fn take_item(
    host: &mut dyn GameHost,
    ctx: &ApplyContext<'_>,
    item: &str,
    quantity: u64,
) -> Result<(), DialogError> {
    let actor = &ctx.conversation.actor;
    let is_currency = item == ctx.config.currency_item;
    let quantity = match quantity {
        0 if is_currency => host.currency_total(actor),
        0 => host.count_item(actor, item),
        n => n,
    };
    if quantity == 0 {
        return Err(DialogError::missing("item", item, format!("'{}' holds none", actor.name)));
    }
    let result = if is_currency {
        host.withdraw_currency(actor, quantity)
    } else {
        host.destroy_item(actor, item, quantity)
    };
    result.map_err(|e| DialogError::missing("item", item, format!("{e:#}")))?;
    info!(
        "└─ effect: TakeItem(\"{item}\" x{quantity}, from {}) [{}]",
        actor.name, ctx.conversation.namespace
    );
    Ok(())
}

/// Signal a map connection on behalf of the speaker.
pub fn trigger_connection(host: &mut dyn GameHost, ctx: &ApplyContext<'_>, id: i64) -> Result<(), DialogError> {
    host.trigger_connection(id, true, &ctx.conversation.speaker)
        .map_err(|e| DialogError::missing("connection", &id.to_string(), format!("{e:#}")))?;
    info!("└─ effect: TriggerConnection({id}) [{}]", ctx.conversation.namespace);
    Ok(())
}

/// Store the current in-game time as `year-month-day-hour-minute`.
pub fn mark_timestamp(host: &mut dyn GameHost, ctx: &ApplyContext<'_>, flag: &str) -> Result<(), DialogError> {
    let conv = ctx.conversation;
    let name = FlagName::new(flag)?;
    let now = host.now().to_string();
    ctx.store.write(host, &conv.actor, &conv.namespace, &name, &now)?;
    info!("└─ effect: MarkTimestamp(\"{flag}\" = {now}) [{}]", conv.namespace);
    Ok(())
}

/// Run the rule's continuation, if it has one.
pub fn run_continuation(host: &mut dyn GameHost, ctx: &ApplyContext<'_>) {
    match ctx.rule.continuation() {
        Some(action) => {
            info!("└─ effect: Callback [{}]", ctx.conversation.namespace);
            action(ctx.conversation, ctx.rule, host);
        },
        None => debug!("callback effect on a rule without a continuation"),
    }
}

fn run_custom(
    host: &mut dyn GameHost,
    ctx: &ApplyContext<'_>,
    kind: &str,
    args: &[String],
) -> Result<(), DialogError> {
    let handler = ctx
        .registry
        .get(kind)
        .ok_or_else(|| DialogError::UnknownEffectKind { kind: kind.to_string() })?;
    handler
        .apply(host, ctx.conversation, args)
        .map_err(|e| DialogError::missing("effect target", kind, format!("{e:#}")))?;
    info!("└─ effect: {kind}({}) [{}]", args.join(", "), ctx.conversation.namespace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::GameTime;
    use crate::host::{Entity, FlagBackend, Inventory, MemoryHost, QuestLog};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        conversation: Conversation,
        config: EngineConfig,
        store: FlagStore,
        registry: EffectRegistry,
        rule: Rule,
    }
    impl Fixture {
        fn new() -> Self {
            Self {
                conversation: Conversation::new(Entity::named("player"), Entity::named("grandpa"), "grandpa"),
                config: EngineConfig::default(),
                store: FlagStore::default(),
                registry: EffectRegistry::new(),
                rule: Rule::new("*", ["ok"]).unwrap(),
            }
        }

        fn apply(&self, host: &mut MemoryHost, effect: &Effect) -> Result<(), DialogError> {
            let ctx = ApplyContext {
                conversation: &self.conversation,
                config: &self.config,
                store: &self.store,
                registry: &self.registry,
                rule: &self.rule,
            };
            apply_effect(host, &ctx, effect)
        }

        fn flag(&self, host: &MemoryHost, name: &str) -> String {
            self.store
                .read(host, &self.conversation.actor, &self.conversation.namespace, name)
        }
    }

    #[test]
    fn wildcard_set_flag_keeps_the_old_value() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        fx.apply(&mut host, &Effect::set_flag("f", "x")).unwrap();
        fx.apply(&mut host, &Effect::set_flag("f", "*")).unwrap();
        assert_eq!(fx.flag(&host, "f"), "x");
    }

    #[test]
    fn quests_only_move_forward() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        let advance = |stage| Effect::AdvanceQuest {
            quest: "scorn/Mork".into(),
            stage,
        };
        fx.apply(&mut host, &advance(10)).unwrap();
        assert_eq!(host.quest_stage(&fx.conversation.actor, "scorn/Mork"), Some(10));
        fx.apply(&mut host, &advance(20)).unwrap();
        let err = fx.apply(&mut host, &advance(19)).unwrap_err();
        assert!(err.is_correctable());
        assert_eq!(
            err,
            DialogError::InvalidQuestRegression {
                quest: "scorn/Mork".into(),
                current: 20,
                requested: 19
            }
        );
        assert_eq!(host.quest_stage(&fx.conversation.actor, "scorn/Mork"), Some(20));
        fx.apply(&mut host, &advance(20)).unwrap();
    }

    #[test]
    fn unknown_quests_are_missing_entities() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        host.known_quests.insert("real".into());
        let err = fx
            .apply(
                &mut host,
                &Effect::AdvanceQuest {
                    quest: "imaginary".into(),
                    stage: 1,
                },
            )
            .unwrap_err();
        assert!(matches!(err, DialogError::MissingExternalEntity { kind: "quest", .. }));
    }

    #[test]
    fn give_moves_from_speaker_and_zero_means_one() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        host.give(&fx.conversation.speaker, "apple", 3);
        fx.apply(
            &mut host,
            &Effect::GiveItem {
                item: "apple".into(),
                quantity: 0,
            },
        )
        .unwrap();
        assert_eq!(host.count_item(&fx.conversation.actor, "apple"), 1);
        assert_eq!(host.count_item(&fx.conversation.speaker, "apple"), 2);

        let err = fx
            .apply(
                &mut host,
                &Effect::GiveItem {
                    item: "apple".into(),
                    quantity: 5,
                },
            )
            .unwrap_err();
        assert!(matches!(err, DialogError::MissingExternalEntity { kind: "item", .. }));
    }

    #[test]
    fn take_zero_takes_the_whole_stack() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        host.give(&fx.conversation.actor, "rat tail", 4);
        let take = |quantity| Effect::TakeItem {
            item: "rat tail".into(),
            quantity,
        };
        fx.apply(&mut host, &take(1)).unwrap();
        assert_eq!(host.count_item(&fx.conversation.actor, "rat tail"), 3);
        fx.apply(&mut host, &take(0)).unwrap();
        assert_eq!(host.count_item(&fx.conversation.actor, "rat tail"), 0);
        assert!(fx.apply(&mut host, &take(0)).is_err());
    }

    #[test]
    fn currency_is_paid_and_received() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        host.add_denomination("silver coin", 1);
        host.add_denomination("gold coin", 10);
        let actor = fx.conversation.actor.clone();
        fx.apply(
            &mut host,
            &Effect::GiveItem {
                item: "money".into(),
                quantity: 25,
            },
        )
        .unwrap();
        assert_eq!(host.currency_total(&actor), 25);
        assert_eq!(host.currency_total(&fx.conversation.speaker), 0);
        fx.apply(
            &mut host,
            &Effect::TakeItem {
                item: "money".into(),
                quantity: 12,
            },
        )
        .unwrap();
        assert_eq!(host.currency_total(&actor), 13);
    }

    #[test]
    fn failed_payment_keeps_the_full_balance() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        host.add_denomination("gold coin", 10);
        host.add_denomination("silver coin", 5);
        let actor = fx.conversation.actor.clone();
        host.give(&actor, "gold coin", 1);
        let err = fx
            .apply(
                &mut host,
                &Effect::TakeItem {
                    item: "money".into(),
                    quantity: 3,
                },
            )
            .unwrap_err();
        assert!(matches!(err, DialogError::MissingExternalEntity { kind: "item", .. }));
        assert_eq!(host.currency_total(&actor), 10);
        assert_eq!(host.count_item(&actor, "gold coin"), 1);
    }

    #[test]
    fn timestamps_are_dash_joined() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        host.clock = GameTime::new(12, 3, 4, 5, 6);
        fx.apply(&mut host, &Effect::MarkTimestamp { flag: "met".into() })
            .unwrap();
        assert_eq!(fx.flag(&host, "met"), "12-3-4-5-6");
    }

    #[test]
    fn connections_are_fired_by_the_speaker() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        fx.apply(&mut host, &Effect::TriggerConnection { id: 42 }).unwrap();
        assert_eq!(host.connections.len(), 1);
        assert_eq!(host.connections[0].id, 42);
        assert_eq!(host.connections[0].source, fx.conversation.speaker.id);

        host.wired_connections.insert(7);
        assert!(fx.apply(&mut host, &Effect::TriggerConnection { id: 42 }).is_err());
    }

    #[test]
    fn unregistered_custom_kinds_fail_loudly() {
        let fx = Fixture::new();
        let mut host = MemoryHost::new();
        let effect = Effect::Custom {
            kind: "heal".into(),
            args: vec!["10".into()],
        };
        assert_eq!(
            fx.apply(&mut host, &effect).unwrap_err(),
            DialogError::UnknownEffectKind { kind: "heal".into() }
        );
    }

    #[test]
    fn registered_custom_kinds_receive_their_args() {
        let mut fx = Fixture::new();
        fx.registry
            .register(
                "remember",
                |host: &mut dyn GameHost, conv: &Conversation, args: &[String]| -> Result<()> {
                    host.write_key(&conv.actor, "memory", &args.join(","), false);
                    Ok(())
                },
            )
            .unwrap();
        let noop = |_: &mut dyn GameHost, _: &Conversation, _: &[String]| -> Result<()> { Ok(()) };
        assert!(fx.registry.register("setquest", noop).is_err());
        let mut host = MemoryHost::new();
        let effect = Effect::Custom {
            kind: "remember".into(),
            args: vec!["a".into(), "b".into()],
        };
        fx.apply(&mut host, &effect).unwrap();
        assert_eq!(host.raw_key(&fx.conversation.actor, "memory"), Some("a,b"));
    }

    #[test]
    fn callback_runs_the_continuation() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let mut fx = Fixture::new();
        fx.rule = Rule::new("*", ["ok"])
            .unwrap()
            .with_continuation(|_: &Conversation, _: &Rule, _: &mut dyn GameHost| {
                CALLS.fetch_add(1, Ordering::SeqCst);
            });
        let mut host = MemoryHost::new();
        fx.apply(&mut host, &Effect::Callback).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn two_element_form_is_used_for_plain_flags() {
        assert_eq!(Effect::set_flag("hello", "1").to_args(), vec!["hello", "1"]);
        assert_eq!(Effect::set_flag("callback", "1").to_args(), vec!["setflag", "callback", "1"]);
        assert_eq!(Effect::TriggerConnection { id: 3 }.to_string(), "[connection, 3]");
    }
}
