//! Trace extraction
//!
//! Turns program sequences into canonical text. Rendering is pluggable per
//! environment so encoders and the clusterer never see program IDs directly.

pub mod catalog;
pub mod extractor;

pub use catalog::{ProgramCatalog, StaticCatalog};
pub use extractor::{
    DEFAULT_SEPARATOR, ExtractorConfig, ExtractorKind, NameJoinExtractor, StepIndexedExtractor,
    TraceExtractor, build_extractor,
};
