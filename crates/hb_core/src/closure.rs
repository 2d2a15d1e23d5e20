//! Closure-model registry: which external fields each model id supplies.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps a closure model id to the names of the fields it evaluates.
///
/// The graph only records the names; producing values is up to the caller
/// (see [`crate::graph::FieldValues`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClosureModels {
    models: BTreeMap<String, Vec<String>>,
}

impl ClosureModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model_id: &str, fields: &[&str]) -> Self {
        self.insert(model_id, fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn insert(&mut self, model_id: &str, fields: Vec<String>) {
        self.models.insert(model_id.to_string(), fields);
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.models.keys().map(String::as_str)
    }

    /// Fields supplied by `model_id`; an unknown id is a configuration error.
    pub fn fields(&self, model_id: &str) -> Result<&[String], ConfigError> {
        self.models
            .get(model_id)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::NotInAllowedSet {
                key: "Model ID".to_string(),
                value: model_id.to_string(),
                allowed: self
                    .models
                    .keys()
                    .map(|k| format!("\"{k}\""))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}
