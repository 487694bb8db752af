//! Typed settings maps and their validation.
//!
//! A part is started with a `SettingsMap`. The owning layer validates the map
//! against the part's `SettingDefinitions` before the scheduling loop is
//! launched, so a misconfigured part never starts. Validation aggregates
//! every violation rather than failing on the first, so the caller sees the
//! full shape of a bad request in one round trip.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The value types a setting may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingKind {
    Str,
    Int,
    Bool,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKind::Str => write!(f, "string"),
            SettingKind::Int => write!(f, "int"),
            SettingKind::Bool => write!(f, "bool"),
        }
    }
}

/// A single setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Str(_) => SettingKind::Str,
            SettingValue::Int(_) => SettingKind::Int,
            SettingValue::Bool(_) => SettingKind::Bool,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Str(s) => write!(f, "{}", s),
            SettingValue::Int(i) => write!(f, "{}", i),
            SettingValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Str(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Str(s)
    }
}

impl From<i64> for SettingValue {
    fn from(i: i64) -> Self {
        SettingValue::Int(i)
    }
}

impl From<i32> for SettingValue {
    fn from(i: i32) -> Self {
        SettingValue::Int(i64::from(i))
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Bool(b)
    }
}

/// Settings handed to a part at start.
pub type SettingsMap = HashMap<String, SettingValue>;

/// Definition of a single recognized setting.
#[derive(Debug, Clone, Copy)]
pub struct SettingDefinition {
    pub kind: SettingKind,
    pub required: bool,
}

/// The set of settings a part recognizes at start.
///
/// Unrecognized keys are deliberately tolerated: a create-replication request
/// carries non-setting parameters alongside settings, and each consumer picks
/// out what it knows.
#[derive(Debug, Clone, Default)]
pub struct SettingDefinitions {
    defs: HashMap<String, SettingDefinition>,
}

impl SettingDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Builder-style so static definition sets read as a
    /// single expression.
    pub fn define(mut self, key: &str, kind: SettingKind, required: bool) -> Self {
        self.defs
            .insert(key.to_string(), SettingDefinition { kind, required });
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.defs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Validate a settings map against these definitions.
    ///
    /// Collects one violation per offending key: a required key that was not
    /// supplied, or a supplied value whose type does not match the
    /// definition.
    pub fn validate(&self, settings: &SettingsMap) -> Result<(), SettingsError> {
        tracing::debug!(
            num_definitions = self.defs.len(),
            num_settings = settings.len(),
            "validating settings"
        );

        let mut err = SettingsError::new();
        for (key, def) in &self.defs {
            match settings.get(key) {
                None if def.required => {
                    err.add(key, "required, but not supplied".to_string());
                }
                None => {}
                Some(val) => {
                    if val.kind() != def.kind {
                        err.add(
                            key,
                            format!("expected type is {}, supplied type is {}", def.kind, val.kind()),
                        );
                    }
                }
            }
        }

        if err.is_empty() {
            Ok(())
        } else {
            tracing::info!(violations = %err, "settings validation failed");
            Err(err)
        }
    }
}

/// Aggregate of per-key settings violations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsError {
    // BTreeMap keeps rendering deterministic for tests and logs.
    violations: BTreeMap<String, String>,
}

impl SettingsError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, reason: String) {
        self.violations.insert(key.to_string(), reason);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.violations.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid settings: ")?;
        for (i, (key, reason)) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", key, reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> SettingDefinitions {
        SettingDefinitions::new()
            .define("batch_size", SettingKind::Int, true)
            .define("active", SettingKind::Bool, false)
            .define("log_level", SettingKind::Str, false)
    }

    #[test]
    fn accepts_well_formed_settings() {
        let mut settings = SettingsMap::new();
        settings.insert("batch_size".to_string(), 500.into());
        settings.insert("active".to_string(), true.into());

        assert!(defs().validate(&settings).is_ok());
    }

    #[test]
    fn tolerates_unrecognized_keys() {
        let mut settings = SettingsMap::new();
        settings.insert("batch_size".to_string(), 500.into());
        settings.insert("fromBucket".to_string(), "beer-sample".into());

        assert!(defs().validate(&settings).is_ok());
    }

    #[test]
    fn reports_missing_required_key() {
        let settings = SettingsMap::new();

        let err = defs().validate(&settings).unwrap_err();
        assert_eq!(err.len(), 1);
        let (key, reason) = err.violations().next().unwrap();
        assert_eq!(key, "batch_size");
        assert!(reason.contains("required"));
    }

    #[test]
    fn aggregates_all_violations() {
        let mut settings = SettingsMap::new();
        settings.insert("active".to_string(), SettingValue::Str("yes".to_string()));
        settings.insert("log_level".to_string(), 3.into());

        let err = defs().validate(&settings).unwrap_err();
        // missing batch_size + two type mismatches
        assert_eq!(err.len(), 3);
        assert!(err.to_string().contains("expected type is bool"));
    }

    #[test]
    fn setting_value_conversions() {
        assert_eq!(SettingValue::from(5).kind(), SettingKind::Int);
        assert_eq!(SettingValue::from("x").as_str(), Some("x"));
        assert_eq!(SettingValue::from(false).as_bool(), Some(false));
        assert_eq!(SettingValue::from(7).as_str(), None);
    }
}
