use serde::{Deserialize, Deserializer, Serialize};

/// Top-level rule-set document, as authored by content writers.
///
/// Both `location` and `rules` are mandatory; a document missing either one is rejected
/// by the deserializer before validation ever runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetDef {
    /// Conversation namespace the flags of this rule set are stored under.
    pub location: String,
    pub rules: Vec<RuleDef>,
}

/// One rule entry of a rule-set document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    /// Keyword pattern; alternatives are separated with `|`, and `*` matches anything.
    #[serde(rename = "match")]
    pub keywords: String,
    #[serde(default, deserialize_with = "atom_lists")]
    pub pre: Vec<Vec<String>>,
    #[serde(default, deserialize_with = "atom_lists")]
    pub post: Vec<Vec<String>>,
    pub msg: Vec<String>,
    /// Map connection to trigger after the explicit postconditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<i64>,
}

impl RuleDef {
    pub fn new(keywords: impl Into<String>, msg: Vec<String>) -> Self {
        Self {
            keywords: keywords.into(),
            pre: Vec::new(),
            post: Vec::new(),
            msg,
            connected: None,
        }
    }
}

/// Scalar accepted inside `pre` / `post` arrays. Authors often write counts and stages
/// as bare JSON numbers, so they are normalized to strings here. Booleans and nulls are
/// rejected: flag values are strings like `"1"`, never JSON `true`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Atom {
    Text(String),
    Int(i64),
    Float(f64),
}
impl From<Atom> for String {
    fn from(atom: Atom) -> Self {
        match atom {
            Atom::Text(text) => text,
            Atom::Int(n) => n.to_string(),
            Atom::Float(f) => f.to_string(),
        }
    }
}

fn atom_lists<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<Atom>> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|list| list.into_iter().map(String::from).collect())
        .collect())
}

/// Leading tags recognized inside `pre` and `post` arrays.
///
/// An array whose first element is not one of these tags is read as a plain flag
/// entry (`[flag, value...]`).
pub mod tags {
    pub const TOKEN: &str = "token";
    pub const ITEM: &str = "item";
    pub const QUEST: &str = "quest";
    pub const LEVEL: &str = "level";
    pub const AGE: &str = "age";

    pub const SET_FLAG: &str = "setflag";
    pub const SET_QUEST: &str = "setquest";
    pub const GIVE_ITEM: &str = "giveitem";
    pub const TAKE_ITEM: &str = "takeitem";
    pub const CONNECTION: &str = "connection";
    pub const MARK_TIME: &str = "marktime";
    pub const CALLBACK: &str = "callback";

    pub const PRECONDITIONS: [&str; 5] = [TOKEN, ITEM, QUEST, LEVEL, AGE];
    pub const EFFECTS: [&str; 7] = [SET_FLAG, SET_QUEST, GIVE_ITEM, TAKE_ITEM, CONNECTION, MARK_TIME, CALLBACK];

    pub fn is_precondition_tag(tag: &str) -> bool {
        PRECONDITIONS.contains(&tag)
    }

    pub fn is_effect_tag(tag: &str) -> bool {
        EFFECTS.contains(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_in_condition_arrays_become_strings() {
        let json = r#"{"match": "age", "pre": [["age", "met", 0, 0, 1, 0, 0]], "msg": ["Hm."]}"#;
        let rule: RuleDef = serde_json::from_str(json).expect("rule parses");
        assert_eq!(rule.pre[0], vec!["age", "met", "0", "0", "1", "0", "0"]);
        assert!(rule.post.is_empty());
        assert_eq!(rule.connected, None);
    }

    #[test]
    fn booleans_in_condition_arrays_are_rejected() {
        let json = r#"{"match": "hi", "post": [["greeted", true]], "msg": ["Hi."]}"#;
        assert!(serde_json::from_str::<RuleDef>(json).is_err());
        let json = r#"{"match": "hi", "pre": [["greeted", null]], "msg": ["Hi."]}"#;
        assert!(serde_json::from_str::<RuleDef>(json).is_err());
    }

    #[test]
    fn missing_rules_is_a_parse_error() {
        let json = r#"{"location": "grandpa"}"#;
        assert!(serde_json::from_str::<RuleSetDef>(json).is_err());
    }

    #[test]
    fn missing_location_is_a_parse_error() {
        let json = r#"{"rules": []}"#;
        assert!(serde_json::from_str::<RuleSetDef>(json).is_err());
    }

    #[test]
    fn connected_is_omitted_when_absent() {
        let rule = RuleDef::new("*", vec!["What?".into()]);
        let text = serde_json::to_string(&rule).expect("serializes");
        assert!(!text.contains("connected"));
        assert!(text.contains(r#""match":"*""#));
    }
}
