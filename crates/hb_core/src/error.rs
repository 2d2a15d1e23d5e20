//! Error taxonomy for equation-set construction and graph evaluation.
//!
//! Every construction error is fatal to the attempt: a caller receiving one
//! must treat the equation set (or template manager) as unconstructed.

use std::fmt;

/// Missing, unknown or ill-typed configuration entries.
///
/// `key` is the full path of the entry, e.g. `FreqDom Options/Truncation order`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required parameter \"{key}\" (expected {expected})")]
    MissingKey { key: String, expected: String },

    #[error("unknown parameter \"{key}\"; valid parameters are: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("parameter \"{key}\" = {value} has the wrong type (expected {expected})")]
    TypeMismatch {
        key: String,
        value: String,
        expected: String,
    },

    #[error("parameter \"{key}\" = \"{value}\" is not one of the allowed values: {allowed}")]
    NotInAllowedSet {
        key: String,
        value: String,
        allowed: String,
    },

    #[error("parameter \"{key}\" = {value} is out of range (expected {bound})")]
    OutOfRange {
        key: String,
        value: String,
        bound: String,
    },

    #[error("equation set \"{type_name}\" requires a \"{sublist}\" parameter sublist")]
    MissingSublist { type_name: String, sublist: String },
}

impl ConfigError {
    /// The configuration key (path) this error is about.
    pub fn key(&self) -> &str {
        match self {
            ConfigError::MissingKey { key, .. }
            | ConfigError::UnknownKey { key, .. }
            | ConfigError::TypeMismatch { key, .. }
            | ConfigError::NotInAllowedSet { key, .. }
            | ConfigError::OutOfRange { key, .. } => key,
            ConfigError::MissingSublist { sublist, .. } => sublist,
        }
    }
}

/// A node input that no producer or external supplier provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingInput {
    pub field: String,
    pub required_by: String,
}

impl fmt::Display for DanglingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" (required by \"{}\")", self.field, self.required_by)
    }
}

fn join_dangling(inputs: &[DanglingInput]) -> String {
    inputs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Integrity violations while building a named-field graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("field \"{0}\" is already produced by another node")]
    DuplicateField(String),

    #[error("unresolved field references: {}", join_dangling(.0))]
    UnresolvedReference(Vec<DanglingInput>),

    #[error("cyclic field dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("cannot build summation \"{0}\" from an empty operand list")]
    EmptyOperandList(String),
}

/// Errors surfaced by the equation-set factory and constructors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EquationSetError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("equation set type \"{type_name}\" is not a valid equation set identifier (registered: {registered})")]
    UnknownEquationType {
        type_name: String,
        registered: String,
    },

    #[error("equation set type \"{0}\" is already registered")]
    DuplicateRegistration(String),

    #[error("time domain equation set \"{type_name}\" cannot be wrapped in the frequency domain (supported: {supported})")]
    UnsupportedTimeDomainType {
        type_name: String,
        supported: String,
    },
}

/// Errors raised while evaluating a finalized graph over a workset.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("no values supplied for field \"{0}\"")]
    MissingField(String),

    #[error("field \"{field}\" has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("workset is inconsistent: {0}")]
    InvalidWorkset(String),
}
