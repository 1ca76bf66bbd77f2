use std::io::Write;
use std::sync::Arc;

use parley_engine as pe;
use pe::*;
use pe::host::{FlagBackend, Speech};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const VAULT: &str = r#"{
    "location": "vault",
    "rules": [
        {"match": "open", "pre": [["unlocked", "1"]], "msg": ["The vault swings open."], "connected": 4},
        {"match": "open", "msg": ["It will not budge."]},
        {"match": "password|swordfish", "pre": [["unlocked", "0"]], "post": [["unlocked", "1"]], "msg": ["Click."]},
        {"match": "*", "msg": ["$me ignores $you."]}
    ]
}"#;

fn guard() -> Conversation {
    Conversation::new(Entity::named("Wanderer"), Entity::named("the guard"), "vault")
}

#[test]
fn test_load_from_file() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{VAULT}").unwrap();
    let set = load_rule_set_file(file.path()).expect("rule set loads");
    assert_eq!(set.location, "vault");
    assert_eq!(set.len(), 4);

    let missing = file.path().with_extension("missing");
    assert!(matches!(
        load_rule_set_file(&missing),
        Err(DialogError::MalformedRuleSet(_))
    ));
}

#[test]
fn test_flags_set_by_one_rule_gate_another() {
    init_logging();
    let dialog = Dialog::from_rule_set(load_rule_set_str(VAULT).unwrap());
    let mut host = MemoryHost::new();
    let conv = guard();

    dialog.speak(&mut host, &conv, "open");
    dialog.speak(&mut host, &conv, "swordfish");
    dialog.speak(&mut host, &conv, "open");
    dialog.speak(&mut host, &conv, "password");
    assert_eq!(
        host.transcript(),
        vec![
            "It will not budge.",
            "Click.",
            "The vault swings open.",
            "the guard ignores Wanderer."
        ]
    );
    assert_eq!(host.connections.len(), 1);
    assert_eq!(host.connections[0].id, 4);
    assert!(host.connections[0].state);
}

#[test]
fn test_documents_round_trip() {
    let set = load_rule_set_str(VAULT).unwrap();
    let text = serde_json::to_string_pretty(&set.to_def()).unwrap();
    let again = load_rule_set_str(&text).unwrap();
    assert_eq!(again, set);
    assert_eq!(again.to_def(), set.to_def());
}

#[test]
fn test_embedded_json_value() {
    let value = serde_json::json!({
        "location": "inn",
        "rules": [{"match": "ale", "pre": [["item", "money", 3]], "post": [["takeitem", "money", 3], ["giveitem", "ale"]], "msg": ["Cheers."]}]
    });
    let set = load_rule_set_value(value).unwrap();
    assert_eq!(
        set.rules[0].effects()[1],
        Effect::GiveItem {
            item: "ale".into(),
            quantity: 1
        }
    );
}

#[test]
fn test_custom_effects_need_registration() {
    init_logging();
    let text = r#"{"location": "shrine", "rules": [
        {"match": "pray", "post": [["bless", "Wanderer", "3"], ["prayed", "1"]], "msg": ["You feel watched."]}
    ]}"#;
    let set = load_rule_set_str(text).unwrap();
    let conv = Conversation::new(Entity::named("Wanderer"), Entity::named("shrine"), "shrine");
    let store = FlagStore::default();

    // unregistered: skipped, the remaining effects still apply
    let mut host = MemoryHost::new();
    let plain = Dialog::from_rule_set(set.clone());
    assert!(plain.speak(&mut host, &conv, "pray").is_handled());
    assert_eq!(store.read(&host, &conv.actor, "shrine", "prayed"), "1");
    assert_eq!(host.raw_key(&conv.actor, "blessing"), None);

    let mut registry = EffectRegistry::new();
    registry
        .register(
            "bless",
            |host: &mut dyn GameHost, conv: &Conversation, args: &[String]| -> anyhow::Result<()> {
                host.write_key(&conv.actor, "blessing", &args.join("/"), true);
                Ok(())
            },
        )
        .unwrap();
    let mut host = MemoryHost::new();
    let blessed = Dialog::from_rule_set(set).with_registry(registry);
    blessed.speak(&mut host, &conv, "pray");
    assert_eq!(host.raw_key(&conv.actor, "blessing"), Some("Wanderer/3"));
}

#[test]
fn test_callbacks_attached_after_loading() {
    let text = r#"{"location": "smith", "rules": [
        {"match": "forge", "post": [["callback"], ["forged", "1"]], "msg": ["Clang."]},
        {"match": "secret", "msg": ["Hush."]},
        {"match": "*", "msg": ["Busy."]}
    ]}"#;
    let mut set = load_rule_set_str(text).unwrap();
    set.attach_continuation(
        0,
        Arc::new(|conv: &Conversation, _: &Rule, host: &mut dyn GameHost| {
            let forged = FlagStore::default().read(&*host, &conv.actor, &conv.namespace, "forged");
            host.say(&conv.speaker, &conv.actor, &format!("forged={forged}"));
        }),
    )
    .unwrap();
    set.attach_guard(1, Arc::new(|_: &Conversation, _: &Rule, _: &dyn GameHost| false))
        .unwrap();

    let dialog = Dialog::from_rule_set(set);
    let mut host = MemoryHost::new();
    let conv = Conversation::new(Entity::named("Wanderer"), Entity::named("smith"), "smith");
    dialog.speak(&mut host, &conv, "forge");
    dialog.speak(&mut host, &conv, "secret");
    // the continuation ran at its callback position, before the flag was set
    assert_eq!(host.transcript(), vec!["Clang.", "forged=0", "Busy."]);
}

#[test]
fn test_config_file_selects_match_mode() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "match_mode = \"exact_token\"\nflag_key_prefix = \"talk_\"").unwrap();
    let config = load_config(file.path());
    assert_eq!(config.match_mode, MatchMode::ExactToken);

    let set = load_rule_set_str(VAULT).unwrap();
    let dialog = Dialog::from_rule_set(set).with_config(config);
    let mut host = MemoryHost::new();
    let conv = guard();
    dialog.speak(&mut host, &conv, "passwords");
    dialog.speak(&mut host, &conv, "the password is swordfish");
    assert_eq!(host.transcript(), vec!["the guard ignores Wanderer.", "Click."]);
    assert_eq!(host.raw_key(&conv.actor, "talk_vault"), Some("unlocked:1"));
}
