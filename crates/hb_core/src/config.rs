//! Configuration dictionaries for equation sets.
//!
//! A [`ParameterList`] is an insertion-ordered mapping from string keys to
//! typed [`ParamValue`]s, possibly nested. It (de)serializes as a plain JSON
//! object so input decks can be written by hand.

pub mod schema;

pub use schema::{ParamKind, ParamSpec, ParameterSchema};

use crate::error::ConfigError;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(ParameterList),
}

impl ParamValue {
    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Double(_) => "double",
            ParamValue::String(_) => "string",
            ParamValue::List(_) => "sublist",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Double(v) => write!(f, "{v:?}"),
            ParamValue::String(v) => write!(f, "{v}"),
            ParamValue::List(list) => write!(f, "<sublist with {} entries>", list.len()),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Double(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

impl From<ParameterList> for ParamValue {
    fn from(v: ParameterList) -> Self {
        ParamValue::List(v)
    }
}

/// Insertion-ordered, string-keyed configuration dictionary.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    entries: Vec<(String, ParamValue)>,
    /// Name of the schema this list was last validated against, cleared on mutation.
    validated_against: Option<String>,
}

impl PartialEq for ParameterList {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, convenient for tests and programmatic decks.
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Inserts or replaces `key`, keeping the original position on replacement.
    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        self.validated_against = None;
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        self.validated_against = None;
        Some(self.entries.remove(idx).1)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut ParamValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_sublist(&self, key: &str) -> bool {
        matches!(self.get(key), Some(ParamValue::List(_)))
    }

    pub fn sublist(&self, key: &str) -> Option<&ParameterList> {
        match self.get(key) {
            Some(ParamValue::List(list)) => Some(list),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ConfigError> {
        match self.required(key, "string")? {
            ParamValue::String(s) => Ok(s),
            other => Err(mismatch(key, other, "string")),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        match self.required(key, "int")? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(mismatch(key, other, "int")),
        }
    }

    /// Reads a double, accepting an integer literal.
    pub fn get_double(&self, key: &str) -> Result<f64, ConfigError> {
        match self.required(key, "double")? {
            ParamValue::Double(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(mismatch(key, other, "double")),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match self.required(key, "bool")? {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(mismatch(key, other, "bool")),
        }
    }

    pub(crate) fn is_validated_against(&self, schema: &str) -> bool {
        self.validated_against.as_deref() == Some(schema)
    }

    pub(crate) fn mark_validated(&mut self, schema: &str) {
        self.validated_against = Some(schema.to_string());
    }

    fn required(&self, key: &str, expected: &str) -> Result<&ParamValue, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
            expected: expected.to_string(),
        })
    }
}

fn mismatch(key: &str, value: &ParamValue, expected: &str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        value: format!("{value} ({})", value.type_name()),
        expected: expected.to_string(),
    }
}

impl Serialize for ParameterList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct ParameterListVisitor;

impl<'de> Visitor<'de> for ParameterListVisitor {
    type Value = ParameterList;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of parameter names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut list = ParameterList::new();
        while let Some((key, value)) = access.next_entry::<String, ParamValue>()? {
            if list.contains(&key) {
                return Err(serde::de::Error::custom(format!(
                    "duplicate parameter \"{key}\""
                )));
            }
            list.entries.push((key, value));
        }
        Ok(list)
    }
}

impl<'de> Deserialize<'de> for ParameterList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ParameterListVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_replaces_in_place_and_keeps_order() {
        let mut list = ParameterList::new()
            .with("Type", "Projection")
            .with("Basis Order", 1)
            .with("Prefix", "");
        list.set("Basis Order", 2);
        let keys: Vec<&str> = list.keys().collect();
        assert_eq!(keys, vec!["Type", "Basis Order", "Prefix"]);
        assert_eq!(list.get_int("Basis Order").expect("int"), 2);
    }

    #[test]
    fn typed_getters_report_key_and_type() {
        let list = ParameterList::new().with("Basis Order", "one");
        let err = list.get_int("Basis Order").expect_err("type mismatch");
        let message = err.to_string();
        assert!(message.contains("Basis Order"), "{message}");
        assert!(message.contains("int"), "{message}");

        let err = list.get_str("Model ID").expect_err("missing");
        assert_eq!(err.key(), "Model ID");
    }

    #[test]
    fn double_getter_widens_integers() {
        let list = ParameterList::new().with("Multiplier", 2);
        assert_eq!(list.get_double("Multiplier").expect("double"), 2.0);
    }

    #[test]
    fn json_round_trip_preserves_order_and_nesting() {
        let text = r#"{
            "Type": "FreqDom",
            "Model ID": "m",
            "FreqDom Options": {
                "Time domain equation set": "Helmholtz",
                "Truncation order": 2
            },
            "Basis Order": 1
        }"#;
        let list: ParameterList = serde_json::from_str(text).expect("deck should parse");
        let keys: Vec<&str> = list.keys().collect();
        assert_eq!(keys, vec!["Type", "Model ID", "FreqDom Options", "Basis Order"]);
        let options = list.sublist("FreqDom Options").expect("sublist");
        assert_eq!(options.get_int("Truncation order").expect("int"), 2);

        let back = serde_json::to_string(&list).expect("serialize");
        let reparsed: ParameterList = serde_json::from_str(&back).expect("reparse");
        assert_eq!(reparsed, list);
    }

    #[test]
    fn duplicate_keys_are_rejected_on_parse() {
        let text = r#"{ "Type": "Projection", "Type": "Helmholtz" }"#;
        let err = serde_json::from_str::<ParameterList>(text).expect_err("duplicate key");
        assert!(err.to_string().contains("duplicate parameter"));
    }
}
