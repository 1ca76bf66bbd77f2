//! Flag store -- persisted conversation state.
//!
//! Every (actor, namespace) pair owns one packed string of the form
//! `name1:value1;name2:value2`, stored by the host under `<prefix><namespace>`.
//! A flag that was never written reads as `"0"`.

use log::{trace, warn};

use crate::error::DialogError;
use crate::host::{Entity, FlagBackend};
use parley_data::has_reserved_separator;

/// Value returned for a flag that has never been written.
pub const DEFAULT_FLAG_VALUE: &str = "0";
/// Precondition value meaning "any value", postcondition value meaning "leave unchanged".
pub const WILDCARD: &str = "*";

/// A flag name that is known to be safe for the packed encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagName(String);
impl FlagName {
    /// # Errors
    /// - if the name is empty or contains `:` or `;`
    pub fn new(name: impl Into<String>) -> Result<Self, DialogError> {
        let name = name.into();
        if name.is_empty() || has_reserved_separator(&name) {
            return Err(DialogError::ReservedSeparator(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Display for FlagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl AsRef<str> for FlagName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Decode a packed flag string into ordered `(name, value)` pairs.
///
/// Pairs without a `:` are dropped with a warning; a repeated name keeps its last value.
pub fn decode_flags(packed: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for chunk in packed.split(';').filter(|c| !c.is_empty()) {
        let Some((name, value)) = chunk.split_once(':') else {
            warn!("skipping malformed flag entry '{chunk}'");
            continue;
        };
        if let Some(existing) = pairs.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value.to_string();
        } else {
            pairs.push((name.to_string(), value.to_string()));
        }
    }
    pairs
}

/// Encode `(name, value)` pairs into the packed flag string.
pub fn encode_flags(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Decoded view of one namespace's flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSnapshot {
    entries: Vec<(String, String)>,
}
impl FlagSnapshot {
    pub fn from_packed(packed: &str) -> Self {
        Self {
            entries: decode_flags(packed),
        }
    }

    /// Current value of `name`, or `"0"` if it was never written.
    pub fn get(&self, name: &str) -> &str {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map_or(DEFAULT_FLAG_VALUE, |(_, v)| v.as_str())
    }

    /// Overwrite `name` in place, or append it if it is new.
    pub fn set(&mut self, name: &FlagName, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name.as_str()) {
            entry.1 = value.to_string();
        } else {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn to_packed(&self) -> String {
        encode_flags(&self.entries)
    }
}

/// Access layer between the dialogue engine and the host's key/value persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagStore {
    key_prefix: String,
    persist_immediately: bool,
}
impl Default for FlagStore {
    fn default() -> Self {
        Self::new("dialog_", true)
    }
}
impl FlagStore {
    pub fn new(key_prefix: impl Into<String>, persist_immediately: bool) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            persist_immediately,
        }
    }

    /// Host key holding the packed flags of `namespace`.
    pub fn storage_key(&self, namespace: &str) -> String {
        format!("{}{namespace}", self.key_prefix)
    }

    /// Read every flag of `namespace` for `actor` at once.
    pub fn snapshot<B: FlagBackend + ?Sized>(&self, backend: &B, actor: &Entity, namespace: &str) -> FlagSnapshot {
        let packed = backend
            .read_key(actor, &self.storage_key(namespace))
            .unwrap_or_default();
        FlagSnapshot::from_packed(&packed)
    }

    /// Read a single flag, defaulting to `"0"`.
    pub fn read<B: FlagBackend + ?Sized>(&self, backend: &B, actor: &Entity, namespace: &str, name: &str) -> String {
        self.snapshot(backend, actor, namespace).get(name).to_string()
    }

    /// Write a single flag. A value of `*` leaves the stored flag untouched.
    ///
    /// # Errors
    /// - if the value contains a reserved separator
    pub fn write<B: FlagBackend + ?Sized>(
        &self,
        backend: &mut B,
        actor: &Entity,
        namespace: &str,
        name: &FlagName,
        value: &str,
    ) -> Result<(), DialogError> {
        if value == WILDCARD {
            trace!("flag '{name}' in '{namespace}' left unchanged (wildcard)");
            return Ok(());
        }
        if has_reserved_separator(value) {
            return Err(DialogError::ReservedSeparator(value.to_string()));
        }
        let mut snapshot = self.snapshot(backend, actor, namespace);
        snapshot.set(name, value);
        backend.write_key(
            actor,
            &self.storage_key(namespace),
            &snapshot.to_packed(),
            self.persist_immediately,
        );
        Ok(())
    }
}
