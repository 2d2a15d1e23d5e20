//! Declarative parameter schemas and the validator that applies them.

use super::{ParamValue, ParameterList};
use crate::error::ConfigError;
use tracing::trace;

/// The type (and restriction) of a single schema entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    String { allowed: Option<Vec<String>> },
    Int { min: Option<i64>, max: Option<i64> },
    Double,
    Bool,
    Sublist(ParameterSchema),
}

impl ParamKind {
    fn describe(&self) -> String {
        match self {
            ParamKind::String { allowed: None } => "string".to_string(),
            ParamKind::String {
                allowed: Some(allowed),
            } => format!("one of {}", quoted(allowed)),
            ParamKind::Int {
                min: None,
                max: None,
            } => "int".to_string(),
            ParamKind::Int {
                min: Some(min),
                max: None,
            } => format!("int >= {min}"),
            ParamKind::Int {
                min: None,
                max: Some(max),
            } => format!("int <= {max}"),
            ParamKind::Int {
                min: Some(min),
                max: Some(max),
            } => format!("int in [{min}, {max}]"),
            ParamKind::Double => "double".to_string(),
            ParamKind::Bool => "bool".to_string(),
            ParamKind::Sublist(schema) => format!("sublist \"{}\"", schema.name),
        }
    }
}

/// One entry of a schema. `default == None` marks the key as required.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub key: String,
    pub kind: ParamKind,
    pub default: Option<ParamValue>,
    pub doc: String,
}

/// A named collection of [`ParamSpec`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    pub name: String,
    pub entries: Vec<ParamSpec>,
}

impl ParameterSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    fn push(mut self, key: &str, kind: ParamKind, default: Option<ParamValue>, doc: &str) -> Self {
        self.entries.retain(|e| e.key != key);
        self.entries.push(ParamSpec {
            key: key.to_string(),
            kind,
            default,
            doc: doc.to_string(),
        });
        self
    }

    pub fn string(self, key: &str, default: &str, doc: &str) -> Self {
        self.push(
            key,
            ParamKind::String { allowed: None },
            Some(default.into()),
            doc,
        )
    }

    pub fn required_string(self, key: &str, doc: &str) -> Self {
        self.push(key, ParamKind::String { allowed: None }, None, doc)
    }

    /// A string restricted to `allowed`. The default is used only when the key is absent.
    pub fn string_choice(self, key: &str, default: &str, allowed: &[&str], doc: &str) -> Self {
        let allowed = allowed.iter().map(|s| s.to_string()).collect();
        self.push(
            key,
            ParamKind::String {
                allowed: Some(allowed),
            },
            Some(default.into()),
            doc,
        )
    }

    pub fn int(self, key: &str, default: i64, doc: &str) -> Self {
        self.push(
            key,
            ParamKind::Int {
                min: None,
                max: None,
            },
            Some(default.into()),
            doc,
        )
    }

    pub fn int_at_least(self, key: &str, default: i64, min: i64, doc: &str) -> Self {
        self.push(
            key,
            ParamKind::Int {
                min: Some(min),
                max: None,
            },
            Some(default.into()),
            doc,
        )
    }

    /// An int restricted to the inclusive range `[min, max]`.
    pub fn int_in_range(self, key: &str, default: i64, min: i64, max: i64, doc: &str) -> Self {
        self.push(
            key,
            ParamKind::Int {
                min: Some(min),
                max: Some(max),
            },
            Some(default.into()),
            doc,
        )
    }

    pub fn double(self, key: &str, default: f64, doc: &str) -> Self {
        self.push(key, ParamKind::Double, Some(default.into()), doc)
    }

    pub fn bool(self, key: &str, default: bool, doc: &str) -> Self {
        self.push(key, ParamKind::Bool, Some(default.into()), doc)
    }

    /// A nested sublist that must be present.
    pub fn sublist(self, key: &str, schema: ParameterSchema, doc: &str) -> Self {
        self.push(key, ParamKind::Sublist(schema), None, doc)
    }

    /// A nested sublist validated only when present.
    pub fn optional_sublist(self, key: &str, schema: ParameterSchema, doc: &str) -> Self {
        self.push(
            key,
            ParamKind::Sublist(schema),
            Some(ParamValue::List(ParameterList::new())),
            doc,
        )
    }

    pub fn spec(&self, key: &str) -> Option<&ParamSpec> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Checks `params` against the schema and fills in defaults for absent keys.
    ///
    /// On failure `params` is left untouched. A list already validated against
    /// a schema of the same name (and not mutated since) is returned as is.
    pub fn validate_and_set_defaults(&self, params: &mut ParameterList) -> Result<(), ConfigError> {
        if params.is_validated_against(&self.name) {
            trace!(schema = %self.name, "parameters already validated");
            return Ok(());
        }
        let mut filled = params.clone();
        self.validate_into(&mut filled, "")?;
        filled.mark_validated(&self.name);
        *params = filled;
        Ok(())
    }

    /// Non-mutating form of [`ParameterSchema::validate_and_set_defaults`].
    pub fn validated(&self, params: &ParameterList) -> Result<ParameterList, ConfigError> {
        let mut filled = params.clone();
        self.validate_and_set_defaults(&mut filled)?;
        Ok(filled)
    }

    fn validate_into(&self, params: &mut ParameterList, path: &str) -> Result<(), ConfigError> {
        for key in params.keys() {
            if self.spec(key).is_none() {
                let valid: Vec<String> = self.entries.iter().map(|e| e.key.clone()).collect();
                return Err(ConfigError::UnknownKey {
                    key: join_path(path, key),
                    valid: quoted(&valid),
                });
            }
        }

        for spec in &self.entries {
            let full_key = join_path(path, &spec.key);
            match params.get_mut(&spec.key) {
                Some(value) => check_value(spec, value, &full_key)?,
                None => match (&spec.default, &spec.kind) {
                    // Absent optional sublists stay absent.
                    (Some(_), ParamKind::Sublist(_)) => {}
                    (Some(default), _) => {
                        trace!(key = %full_key, value = %default, "filling default");
                        params.set(&spec.key, default.clone());
                    }
                    (None, kind) => {
                        return Err(ConfigError::MissingKey {
                            key: full_key,
                            expected: kind.describe(),
                        })
                    }
                },
            }
        }
        Ok(())
    }
}

fn check_value(spec: &ParamSpec, value: &mut ParamValue, key: &str) -> Result<(), ConfigError> {
    let type_error = |value: &ParamValue| ConfigError::TypeMismatch {
        key: key.to_string(),
        value: format!("{value} ({})", value.type_name()),
        expected: spec.kind.describe(),
    };

    if matches!(spec.kind, ParamKind::Double) {
        if let ParamValue::Int(v) = *value {
            *value = ParamValue::Double(v as f64);
            return Ok(());
        }
    }

    match (&spec.kind, value) {
        (ParamKind::String { allowed }, ParamValue::String(s)) => {
            if let Some(allowed) = allowed {
                if !allowed.iter().any(|a| a.as_str() == s.as_str()) {
                    return Err(ConfigError::NotInAllowedSet {
                        key: key.to_string(),
                        value: s.clone(),
                        allowed: quoted(allowed),
                    });
                }
            }
            Ok(())
        }
        (ParamKind::Int { min, max }, ParamValue::Int(v)) => {
            let below = min.is_some_and(|min| *v < min);
            let above = max.is_some_and(|max| *v > max);
            if below || above {
                Err(ConfigError::OutOfRange {
                    key: key.to_string(),
                    value: v.to_string(),
                    bound: spec.kind.describe(),
                })
            } else {
                Ok(())
            }
        }
        (ParamKind::Double, ParamValue::Double(_)) => Ok(()),
        (ParamKind::Bool, ParamValue::Bool(_)) => Ok(()),
        (ParamKind::Sublist(schema), ParamValue::List(list)) => schema.validate_into(list, key),
        (_, other) => Err(type_error(&*other)),
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}/{key}")
    }
}

fn quoted(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options_schema() -> ParameterSchema {
        ParameterSchema::new("Options")
            .string_choice("Equation", "Projection", &["Helmholtz", "Projection"], "choice")
            .int_at_least("Truncation order", 3, 0, "harmonics")
    }

    fn schema() -> ParameterSchema {
        ParameterSchema::new("Test")
            .required_string("Type", "equation type")
            .string("Prefix", "", "prefix")
            .int("Integration Order", -1, "integration")
            .double("Multiplier", 1.0, "scale")
            .optional_sublist("Options", options_schema(), "options")
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T, ConfigError>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn fills_defaults_for_absent_keys() {
        let params = ParameterList::new().with("Type", "Projection");
        let filled = schema().validated(&params).expect("valid");
        assert_eq!(filled.get_str("Prefix").expect("prefix"), "");
        assert_eq!(filled.get_int("Integration Order").expect("order"), -1);
        assert_eq!(filled.get_double("Multiplier").expect("multiplier"), 1.0);
        assert!(!filled.contains("Options"));
    }

    #[test]
    fn rejects_unknown_and_missing_keys() {
        let params = ParameterList::new().with("Type", "Projection").with("Bogus", 1);
        assert_err_contains(schema().validated(&params), "Bogus");

        let params = ParameterList::new().with("Prefix", "a");
        let err = schema().validated(&params).expect_err("missing Type");
        assert_eq!(err.key(), "Type");
    }

    #[test]
    fn invalid_choice_is_not_replaced_by_default() {
        let params = ParameterList::new()
            .with("Type", "Projection")
            .with("Options", ParameterList::new().with("Equation", "Maxwell"));
        let err = schema().validated(&params).expect_err("bad choice");
        assert_eq!(err.key(), "Options/Equation");
        assert_err_contains(Err::<(), _>(err), "\"Helmholtz\", \"Projection\"");
    }

    #[test]
    fn nested_bounds_are_checked() {
        let params = ParameterList::new()
            .with("Type", "Projection")
            .with("Options", ParameterList::new().with("Truncation order", -1));
        let err = schema().validated(&params).expect_err("negative order");
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
        assert_eq!(err.key(), "Options/Truncation order");

        let params = ParameterList::new()
            .with("Type", "Projection")
            .with("Options", ParameterList::new().with("Truncation order", "two"));
        assert_err_contains(schema().validated(&params), "Truncation order");
    }

    #[test]
    fn bounded_ints_reject_both_ends() {
        let bounded = ParameterSchema::new("Bounded").int_in_range("Order", 3, 0, 8, "order");
        assert_eq!(
            bounded
                .validated(&ParameterList::new().with("Order", 8))
                .expect("upper bound is inclusive")
                .get_int("Order")
                .expect("order"),
            8
        );
        for value in [-1, 9] {
            let err = bounded
                .validated(&ParameterList::new().with("Order", value))
                .expect_err("out of range");
            assert!(matches!(err, ConfigError::OutOfRange { .. }));
            assert_err_contains(Err::<(), _>(err), "int in [0, 8]");
        }
    }

    #[test]
    fn failed_validation_leaves_input_untouched() {
        let mut params = ParameterList::new().with("Type", "Projection").with("Bogus", 1);
        let before = params.clone();
        assert!(schema().validate_and_set_defaults(&mut params).is_err());
        assert_eq!(params, before);
    }

    #[test]
    fn validation_is_idempotent() {
        let params = ParameterList::new()
            .with("Type", "Projection")
            .with("Multiplier", 2)
            .with("Options", ParameterList::new());
        let once = schema().validated(&params).expect("first pass");
        let twice = schema().validated(&once).expect("second pass");
        assert_eq!(once, twice);

        // A fresh copy that lost the validation marker still validates to the same list.
        let mut reparsed = ParameterList::new();
        for (key, value) in once.iter() {
            reparsed.set(key, value.clone());
        }
        assert_eq!(schema().validated(&reparsed).expect("third pass"), once);
    }
}
