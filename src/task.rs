//! Task payloads: training examples and test pairs.
//!
//! A task is the `{train, test}` object shape used by the ARC data files,
//! both when fetched from a remote catalog and when imported from a local
//! file. The task name travels out-of-band (catalog entry name or
//! filename), so the wire shape carries only the pair arrays.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::Grid;

/// Errors from task payload validation.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The payload is not a `{train, test}` object of valid grids.
    #[error("malformed task payload for '{name}': {reason}")]
    MalformedPayload { name: String, reason: String },

    /// A training example is missing its output grid.
    #[error("training example {index} in '{name}' has no output grid")]
    MissingTrainOutput { name: String, index: usize },
}

/// An input grid and (optionally) its corresponding output grid.
///
/// Training pairs always carry both; test pairs carry `output` only when
/// the ground truth is known (it is never shown to the solver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub input: Grid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Grid>,
}

/// Raw wire shape of a task file.
#[derive(Debug, Deserialize)]
struct TaskPayload {
    train: Vec<Pair>,
    test: Vec<Pair>,
}

/// One puzzle unit: a named set of training examples and test pairs.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub train: Vec<Pair>,
    pub test: Vec<Pair>,
}

impl Task {
    /// Build a task from already-parsed pairs, validating that every
    /// training example carries an output grid.
    pub fn new(
        name: impl Into<String>,
        train: Vec<Pair>,
        test: Vec<Pair>,
    ) -> Result<Self, TaskError> {
        let name = name.into();
        if let Some(index) = train.iter().position(|pair| pair.output.is_none()) {
            return Err(TaskError::MissingTrainOutput { name, index });
        }
        Ok(Self { name, train, test })
    }

    /// Parse a task from a raw JSON value (`{train, test}`).
    pub fn from_value(
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<Self, TaskError> {
        let name = name.into();
        let payload: TaskPayload =
            serde_json::from_value(value).map_err(|e| TaskError::MalformedPayload {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        Self::new(name, payload.train, payload.test)
    }

    /// Parse a task from JSON text, e.g. a locally imported file.
    pub fn from_json_str(name: impl Into<String>, json: &str) -> Result<Self, TaskError> {
        let name = name.into();
        let payload: TaskPayload =
            serde_json::from_str(json).map_err(|e| TaskError::MalformedPayload {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        Self::new(name, payload.train, payload.test)
    }
}
