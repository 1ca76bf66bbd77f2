//! Shared data model for Parley rule-set documents.

pub mod defs;
pub mod validate;

pub use defs::*;
pub use validate::{RESERVED_SEPARATORS, ValidationError, has_reserved_separator, validate_rule_set};
