//! Error taxonomy for rule loading and effect application.
//!
//! Only the loader lets these escape to callers. During `speak`, every error is logged
//! with its conversation context and converted into a skipped effect.

use thiserror::Error;

/// Failures recognized by the dialogue engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialogError {
    #[error("malformed rule set: {0}")]
    MalformedRuleSet(String),
    #[error("unknown effect kind '{kind}'")]
    UnknownEffectKind { kind: String },
    #[error("quest '{quest}' is already at stage {current}; refusing to move it back to {requested}")]
    InvalidQuestRegression { quest: String, current: u32, requested: u32 },
    #[error("missing {kind} '{name}': {detail}")]
    MissingExternalEntity {
        kind: &'static str,
        name: String,
        detail: String,
    },
    #[error("'{0}' contains a reserved ':' or ';' character")]
    ReservedSeparator(String),
}

impl DialogError {
    pub(crate) fn missing(kind: &'static str, name: &str, detail: impl std::fmt::Display) -> Self {
        Self::MissingExternalEntity {
            kind,
            name: name.to_string(),
            detail: detail.to_string(),
        }
    }

    /// True for failures that leave state untouched and only need a warning.
    pub fn is_correctable(&self) -> bool {
        matches!(self, Self::InvalidQuestRegression { .. })
    }
}
