use std::fmt;

use crate::defs::tags;
use crate::*;

/// Characters that would corrupt the packed `name:value;name:value` flag encoding.
pub const RESERVED_SEPARATORS: [char; 2] = [':', ';'];

/// Validation error for a structurally broken rule-set document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField { context: String },
    EmptyCondition { context: String },
    ReservedSeparator { context: String, value: String },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField { context } => write!(f, "empty field ({context})"),
            ValidationError::EmptyCondition { context } => write!(f, "empty condition array ({context})"),
            ValidationError::ReservedSeparator { context, value } => {
                write!(f, "'{value}' contains a reserved ':' or ';' ({context})")
            },
            ValidationError::InvalidValue { context } => write!(f, "invalid value ({context})"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Returns true if `text` contains a character reserved by the packed flag encoding.
pub fn has_reserved_separator(text: &str) -> bool {
    text.contains(RESERVED_SEPARATORS)
}

/// Validate structural invariants of a rule-set document.
///
/// Every problem found is returned, so authors can fix a document in one pass.
///
/// ```
/// use parley_data::{RuleDef, RuleSetDef, validate_rule_set};
///
/// let mut hello = RuleDef::new("hello|hi", vec!["Hello, lad!".into()]);
/// hello.pre = vec![vec!["hello".into(), "0".into()]];
/// hello.post = vec![vec!["hello".into(), "1".into()]];
/// let set = RuleSetDef {
///     location: "test_grandpa_01".into(),
///     rules: vec![hello],
/// };
/// assert!(validate_rule_set(&set).is_empty());
/// ```
pub fn validate_rule_set(set: &RuleSetDef) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if set.location.trim().is_empty() {
        errors.push(ValidationError::EmptyField {
            context: "rule set location".into(),
        });
    }

    for (idx, rule) in set.rules.iter().enumerate() {
        validate_rule(idx, rule, &mut errors);
    }

    errors
}

fn validate_rule(idx: usize, rule: &RuleDef, errors: &mut Vec<ValidationError>) {
    if rule.keywords.trim().is_empty() {
        errors.push(ValidationError::EmptyField {
            context: format!("rule {idx} match"),
        });
    }
    if rule.msg.is_empty() {
        errors.push(ValidationError::EmptyField {
            context: format!("rule {idx} msg"),
        });
    }

    for (n, pre) in rule.pre.iter().enumerate() {
        let context = format!("rule {idx} pre[{n}]");
        let Some(head) = pre.first() else {
            errors.push(ValidationError::EmptyCondition { context });
            continue;
        };
        // flag checks: [flag, values...] or ["token", flag, values...]
        let flag_fields = if head == tags::TOKEN {
            &pre[1..]
        } else if tags::is_precondition_tag(head) {
            continue;
        } else {
            &pre[..]
        };
        if flag_fields.len() < 2 {
            errors.push(ValidationError::InvalidValue {
                context: format!("{context}: a flag check needs a name and at least one value"),
            });
        }
        check_separators(&context, flag_fields, errors);
    }

    for (n, post) in rule.post.iter().enumerate() {
        let context = format!("rule {idx} post[{n}]");
        let Some(head) = post.first() else {
            errors.push(ValidationError::EmptyCondition { context });
            continue;
        };
        let flag_fields = if head == tags::SET_FLAG {
            &post[1..]
        } else if tags::is_effect_tag(head) || post.len() != 2 {
            continue;
        } else {
            &post[..]
        };
        if flag_fields.len() != 2 {
            errors.push(ValidationError::InvalidValue {
                context: format!("{context}: setting a flag needs exactly a name and a value"),
            });
        }
        check_separators(&context, flag_fields, errors);
    }
}

fn check_separators(context: &str, fields: &[String], errors: &mut Vec<ValidationError>) {
    for field in fields.iter().filter(|f| has_reserved_separator(f)) {
        errors.push(ValidationError::ReservedSeparator {
            context: context.to_string(),
            value: field.clone(),
        });
    }
}
