//! Evaluation run identity, results, and the per-block runtime state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Identifier shared by every result produced by one evaluation trigger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EvalOutput {
    /// Decoded binary tensor buffer.
    Tensor(Tensor),
    /// Any other JSON payload (text, numbers, model summaries).
    Value(serde_json::Value),
}

impl EvalOutput {
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            EvalOutput::Tensor(t) => Some(t),
            EvalOutput::Value(_) => None,
        }
    }

    /// JSON view; tensors become nested arrays.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            EvalOutput::Tensor(t) => t.to_nested(),
            EvalOutput::Value(v) => v.clone(),
        }
    }
}

/// Outcome of one block in one run.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct EvalResult {
    pub error: Option<String>,
    pub output: Option<EvalOutput>,
}

impl EvalResult {
    pub fn ok(output: EvalOutput) -> Self {
        Self {
            error: None,
            output: Some(output),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            output: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Runtime-only block fields. Never sent to the authority.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct EvalState {
    pub running: bool,
    pub err: Option<String>,
    pub out: Option<EvalOutput>,
    /// Run whose result is (or will be) reflected in `err`/`out`.
    pub eval_id: Option<RunId>,
}

impl EvalState {
    /// A new evaluation was requested. Its run id is not known until results are announced.
    pub fn begin(&mut self) {
        self.running = true;
        self.err = None;
        self.out = None;
        self.eval_id = None;
    }

    /// Switch to a newer run; the previous run's payload no longer applies.
    pub fn advance_to(&mut self, run: &RunId) {
        if self.eval_id.as_ref() != Some(run) {
            self.eval_id = Some(run.clone());
            self.err = None;
            self.out = None;
        }
    }

    /// Apply a fetched result. Results for a run other than the current one are ignored,
    /// as is anything arriving while a new run has been requested but not yet announced.
    pub fn apply(&mut self, run: &RunId, result: &EvalResult) -> bool {
        match &self.eval_id {
            Some(current) if current != run => return false,
            None if self.running => return false,
            _ => {}
        }
        self.eval_id = Some(run.clone());
        self.running = false;
        self.err = result.error.clone();
        self.out = result.output.clone();
        true
    }

    pub fn has_result(&self) -> bool {
        self.err.is_some() || self.out.is_some()
    }

    pub fn result(&self) -> EvalResult {
        EvalResult {
            error: self.err.clone(),
            output: self.out.clone(),
        }
    }
}
