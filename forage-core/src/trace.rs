//! Immutable execution traces
//!
//! A [`Trace`] is built once from a [`Rollout`] and a [`TraceExtractor`]; its
//! text is rendered at construction and never recomputed.

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, Result};
use crate::extraction::TraceExtractor;
use crate::types::ProgramId;

/// Raw output of one rollout, as reported by the environment executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    /// Programs actually run, in order
    pub programs: Vec<ProgramId>,
    /// Accumulated reward for this rollout
    pub value: f64,
}

impl Rollout {
    pub fn new(programs: Vec<ProgramId>, value: f64) -> Self {
        Self { programs, value }
    }
}

/// Record of one completed execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    programs: Vec<ProgramId>,
    value: f64,
    text: String,
}

impl Trace {
    /// Build a trace, rendering its text with `extractor`.
    ///
    /// Fails with `InvalidTrace` for an empty or unrenderable sequence and with
    /// `ExecutionError::NonFiniteValue` for a NaN or infinite value.
    pub fn new(
        programs: Vec<ProgramId>,
        value: f64,
        extractor: &dyn TraceExtractor,
    ) -> Result<Self> {
        if !value.is_finite() {
            return Err(ExecutionError::NonFiniteValue(value).into());
        }
        let text = extractor.extract(&programs)?;
        Ok(Self {
            programs,
            value,
            text,
        })
    }

    pub fn from_rollout(rollout: Rollout, extractor: &dyn TraceExtractor) -> Result<Self> {
        Self::new(rollout.programs, rollout.value, extractor)
    }

    pub fn programs(&self) -> &[ProgramId] {
        &self.programs
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Always false: traces are non-empty by construction
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
