//! Trace-to-text rendering strategies

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ForageError, Result};
use crate::types::ProgramId;

use super::catalog::ProgramCatalog;

/// Default separator between rendered programs
pub const DEFAULT_SEPARATOR: &str = " ";

/// Renders a program sequence as canonical text for encoding
///
/// Implementations must be pure: the same sequence always yields the same
/// text, and rendering has no side effects.
pub trait TraceExtractor: Send + Sync {
    /// Render `programs` as text.
    ///
    /// Fails with [`ForageError::InvalidTrace`] for an empty sequence or a
    /// program the extractor cannot render.
    fn extract(&self, programs: &[ProgramId]) -> Result<String>;
}

fn ensure_non_empty(programs: &[ProgramId]) -> Result<()> {
    if programs.is_empty() {
        return Err(ForageError::InvalidTrace(
            "program sequence is empty".to_string(),
        ));
    }
    Ok(())
}

fn unknown_program(id: ProgramId) -> ForageError {
    ForageError::InvalidTrace(format!("program {id} is not in the catalog"))
}

/// Joins catalog names with a fixed separator
pub struct NameJoinExtractor {
    catalog: Arc<dyn ProgramCatalog>,
    separator: String,
}

impl NameJoinExtractor {
    pub fn new(catalog: Arc<dyn ProgramCatalog>) -> Self {
        Self::with_separator(catalog, DEFAULT_SEPARATOR)
    }

    pub fn with_separator(catalog: Arc<dyn ProgramCatalog>, separator: impl Into<String>) -> Self {
        Self {
            catalog,
            separator: separator.into(),
        }
    }
}

impl TraceExtractor for NameJoinExtractor {
    fn extract(&self, programs: &[ProgramId]) -> Result<String> {
        ensure_non_empty(programs)?;
        let names = programs
            .iter()
            .map(|&id| self.catalog.name_of(id).ok_or_else(|| unknown_program(id)))
            .collect::<Result<Vec<_>>>()?;
        Ok(names.join(&self.separator))
    }
}

/// Renders `<step>:<description>` tokens
///
/// Step indices make the text order-sensitive even for bag-style encoders,
/// and descriptions carry per-step arguments when the catalog has them.
pub struct StepIndexedExtractor {
    catalog: Arc<dyn ProgramCatalog>,
    separator: String,
}

impl StepIndexedExtractor {
    pub fn new(catalog: Arc<dyn ProgramCatalog>) -> Self {
        Self {
            catalog,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl TraceExtractor for StepIndexedExtractor {
    fn extract(&self, programs: &[ProgramId]) -> Result<String> {
        ensure_non_empty(programs)?;
        let mut tokens = Vec::with_capacity(programs.len());
        for (step, &id) in programs.iter().enumerate() {
            let description = self
                .catalog
                .describe(id)
                .ok_or_else(|| unknown_program(id))?;
            tokens.push(format!("{step}:{description}"));
        }
        Ok(tokens.join(&self.separator))
    }
}

/// Which extractor strategy to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    #[default]
    NameJoin,
    StepIndexed,
}

/// Configuration for trace extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub kind: ExtractorKind,
    /// Separator placed between rendered programs
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            kind: ExtractorKind::default(),
            separator: default_separator(),
        }
    }
}

/// Build the configured extractor over `catalog`
pub fn build_extractor(
    config: &ExtractorConfig,
    catalog: Arc<dyn ProgramCatalog>,
) -> Arc<dyn TraceExtractor> {
    match config.kind {
        ExtractorKind::NameJoin => Arc::new(NameJoinExtractor::with_separator(
            catalog,
            config.separator.clone(),
        )),
        ExtractorKind::StepIndexed => Arc::new(
            StepIndexedExtractor::new(catalog).with_separator(config.separator.clone()),
        ),
    }
}
